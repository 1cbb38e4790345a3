use mcl_client::Client;

use crate::cmd::{resolve, GetArgs};
use crate::exit::{client_error, param_error, CliResult, SUCCESS};
use crate::output::{print_value, OutputFormat};

pub fn run(args: GetArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = Client::new(args.connect.config()?);
    let key = resolve(client.registry(), args.category, &args.parameter)?;

    args.connect.connect(&mut client)?;
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
