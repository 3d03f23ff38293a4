use crate::cli::ConfigCommands;
use crate::commands::common::Context;
use crate::error::CliError;

pub fn run_config(command: &ConfigCommands, ctx: &Context) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => {
            let mut effective = ctx.config.clone();
            effective.database_path = Some(ctx.db_path.clone());
            println!("{}", serde_json::to_string_pretty(&effective)?);
        }
        ConfigCommands::Path => println!("{}", ctx.config_path.display()),
    }
    Ok(())
}
