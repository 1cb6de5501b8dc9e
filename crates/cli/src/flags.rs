//! CLI flags contributed by argument declarations.

use std::collections::HashSet;
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use shipyard_lib::argument::{Argument, ArgumentType, CliValues};

/// Append one long option per distinct argument flag to `command`.
pub fn register(mut command: Command, arguments: &[Arc<Argument>]) -> Command {
  let mut seen = HashSet::new();
  for argument in arguments {
    for flag in &argument.flags {
      if !seen.insert(flag.name) {
        continue;
      }

      let mut arg = Arg::new(flag.name)
        .long(flag.name)
        .help(flag.usage)
        .help_heading("Build arguments");
      arg = match argument.argument_type {
        ArgumentType::Bool => arg.action(ArgAction::SetTrue),
        ArgumentType::Int64 => arg.value_parser(value_parser!(i64)),
        _ => arg.value_name(value_name(argument.argument_type)),
      };
      if let Some(default) = flag.default
        && argument.argument_type != ArgumentType::Bool
      {
        arg = arg.default_value(default);
      }
      command = command.arg(arg);
    }
  }
  command
}

fn value_name(argument_type: ArgumentType) -> &'static str {
  match argument_type {
    ArgumentType::File => "FILE",
    ArgumentType::Directory | ArgumentType::CacheVolume => "DIR",
    _ => "VALUE",
  }
}

/// Collect the values of every registered flag that was given or defaulted.
pub fn collect(matches: &ArgMatches, arguments: &[Arc<Argument>]) -> CliValues {
  let mut values = CliValues::new();
  for argument in arguments {
    for flag in &argument.flags {
      let value = match argument.argument_type {
        ArgumentType::Bool => matches.get_flag(flag.name).then(|| "true".to_string()),
        ArgumentType::Int64 => matches.get_one::<i64>(flag.name).map(i64::to_string),
        _ => matches.get_one::<String>(flag.name).cloned(),
      };
      if let Some(value) = value {
        values.set(flag.name, value);
      }
    }
  }
  values
}
