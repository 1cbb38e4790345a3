use mcl_client::Client;
use mcl_frame::CONFIGURATION;
use mcl_params::{Codec, FieldValue, ParamError};

use crate::cmd::{resolve, SetArgs};
use crate::exit::{client_error, param_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_value, OutputFormat};

pub fn run(args: SetArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = Client::new(args.connect.config()?);
    let key = resolve(client.registry(), CONFIGURATION, &args.parameter)?;

    // Reject bad input before touching the network. The write itself needs
    // the system's current record, so it happens after connect.
    let value = {
        let parameter = client
            .registry()
            .parameter(key)
            .map_err(|err| param_error("lookup failed", err))?;
        if !parameter.access().is_writable() {
            return Err(param_error("set rejected", ParamError::ReadOnly(key)));
        }
        let layout = match parameter.codec() {
            Codec::Fixed(layout) => layout,
            other => {
                return Err(CliError::new(
                    USAGE,
                    format!("{key} holds {} values and has no fields", other.shape_name()),
                ))
            }
        };
        let (_, spec) = layout.field(&args.field).ok_or_else(|| {
            param_error(
                "set rejected",
                ParamError::UnknownField {
                    key,
                    field: args.field.clone(),
                },
            )
        })?;
        let value = FieldValue::parse(spec.ty, &args.value)
            .map_err(|err| param_error("set rejected", err))?;
        spec.check(key, &value)
            .map_err(|err| param_error("set rejected", err))?;
        value
    };

    args.connect.connect(&mut client)?;
    client
        .set_field(key.category, key.index, &args.field, value)
        .map_err(|err| client_error("set failed", err))?;

    let parameter = client
        .registry()
        .parameter(key)
        .map_err(|err| param_error("lookup failed", err))?;
    print_value(key, parameter.name(), &parameter.value(), format);

    client
        .disconnect()
        .map_err(|err| client_error("disconnect failed", err))?;
    Ok(SUCCESS)
}
