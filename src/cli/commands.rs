//! Command handlers for CLI
//!
//! This module implements the `dbmeta` subcommands.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use crate::config::AppState;
use crate::connection::ConnectionOverrides;
use crate::database::{Introspector, TableDescriptor};
use crate::error::{DbMetaError, Result};
use crate::provider::{
    build_statement, ParameterDescriptor, ProviderFamily, RoutineDescriptor, RoutineKind,
};

/// Routine shapes accepted by `statement`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineShape {
    Procedure,
    Function,
    TableFunction,
}

impl RoutineShape {
    fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "procedure" | "proc" => Some(RoutineShape::Procedure),
            "function" | "func" => Some(RoutineShape::Function),
            "table-function" | "tvf" => Some(RoutineShape::TableFunction),
            _ => None,
        }
    }

    pub fn kind(&self) -> RoutineKind {
        match self {
            RoutineShape::Procedure => RoutineKind::StoredProcedure,
            RoutineShape::Function | RoutineShape::TableFunction => RoutineKind::StoredFunction,
        }
    }

    pub fn returns_table(&self) -> bool {
        matches!(self, RoutineShape::TableFunction)
    }
}

/// A routine parameter as typed on the command line: `name[:cast_type]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterArg {
    pub name: String,
    pub cast: Option<String>,
}

/// Command types
#[derive(Debug, Clone, PartialEq)]
pub enum CommandType {
    /// Show help message
    Help,
    /// Show the version
    Version,
    /// Print the provider capability matrix
    Providers,
    /// Synthesize a routine invocation
    Statement {
        family: ProviderFamily,
        shape: RoutineShape,
        name: String,
        named: bool,
        parameters: Vec<ParameterArg>,
    },
    /// Print the masked options of a profile
    Connection { profile: String },
    /// Describe a table through a profile
    Describe {
        profile: String,
        table: String,
        schema: Option<String>,
        json: bool,
    },
}

/// Parsed command
#[derive(Debug, Clone)]
pub struct Command {
    /// The type of command
    pub command_type: CommandType,
}

const STATEMENT_USAGE: &str =
    "statement <family> <procedure|function|table-function> <name> [--named] [param[:cast_type] ...]";
const CONNECTION_USAGE: &str = "connection <profile>";
const DESCRIBE_USAGE: &str = "describe <profile> <table> [schema] [--json]";

impl Command {
    /// Parse a command line split on whitespace
    pub fn parse(input: &str) -> Result<Self> {
        let args: Vec<&str> = input.split_whitespace().collect();
        Self::from_args(&args)
    }

    /// Parse already-split arguments (without the program name)
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let Some((&cmd, rest)) = args.split_first() else {
            return Ok(Command {
                command_type: CommandType::Help,
            });
        };

        let (flags, positional): (Vec<&str>, Vec<&str>) = rest.iter().copied().partition(|a| a.starts_with("--"));

        let command_type = match cmd {
            "help" | "--help" | "-h" => CommandType::Help,
            "version" | "--version" | "-V" => CommandType::Version,
            "providers" => CommandType::Providers,
            "statement" => {
                if positional.len() < 3 {
                    return Err(syntax(cmd, STATEMENT_USAGE));
                }
                check_flags(cmd, &flags, &["--named"])?;

                let family = positional[0].parse::<ProviderFamily>()?;
                let shape = RoutineShape::parse(positional[1]).ok_or_else(|| syntax(cmd, STATEMENT_USAGE))?;
                let parameters = positional[3..]
                    .iter()
                    .map(|p| parse_parameter(p))
                    .collect::<Result<Vec<_>>>()?;

                CommandType::Statement {
                    family,
                    shape,
                    name: positional[2].to_string(),
                    named: flags.contains(&"--named"),
                    parameters,
                }
            }
            "connection" => {
                if positional.len() != 1 {
                    return Err(syntax(cmd, CONNECTION_USAGE));
                }
                check_flags(cmd, &flags, &[])?;
                CommandType::Connection {
                    profile: positional[0].to_string(),
                }
            }
            "describe" => {
                if positional.len() < 2 || positional.len() > 3 {
                    return Err(syntax(cmd, DESCRIBE_USAGE));
                }
                check_flags(cmd, &flags, &["--json"])?;
                CommandType::Describe {
                    profile: positional[0].to_string(),
                    table: positional[1].to_string(),
                    schema: positional.get(2).map(|s| s.to_string()),
                    json: flags.contains(&"--json"),
                }
            }
            _ => return Err(DbMetaError::CommandParse(format!("unknown command '{}'", cmd))),
        };

        Ok(Command { command_type })
    }
}

fn syntax(command: &str, expected: &str) -> DbMetaError {
    DbMetaError::InvalidCommandSyntax {
        command: command.to_string(),
        expected: expected.to_string(),
    }
}

fn check_flags(command: &str, flags: &[&str], allowed: &[&str]) -> Result<()> {
    match flags.iter().find(|f| !allowed.contains(*f)) {
        Some(flag) => Err(DbMetaError::CommandParse(format!(
            "unknown option '{}' for {}",
            flag, command
        ))),
        None => Ok(()),
    }
}

fn parse_parameter(text: &str) -> Result<ParameterArg> {
    let (name, cast) = match text.split_once(':') {
        Some((name, cast)) => (name, Some(cast)),
        None => (text, None),
    };
    if name.is_empty() || cast.is_some_and(str::is_empty) {
        return Err(DbMetaError::CommandParse(format!("invalid parameter '{}'", text)));
    }
    Ok(ParameterArg {
        name: name.to_string(),
        cast: cast.map(str::to_string),
    })
}

/// Handle a command and return the text to print
pub async fn handle_command(command: &Command, state: &AppState) -> Result<String> {
    match &command.command_type {
        CommandType::Help => Ok(HELP.trim_start().to_string()),
        CommandType::Version => Ok(format!("dbmeta {}", env!("CARGO_PKG_VERSION"))),
        CommandType::Providers => Ok(format_providers()),
        CommandType::Statement {
            family,
            shape,
            name,
            named,
            parameters,
        } => {
            let routine = routine_from_args(*shape, name, *named, parameters);
            build_statement(*family, &routine)
        }
        CommandType::Connection { profile } => {
            let options = state.options(Some(profile.as_str()))?;
            let host = options.host();
            Ok(format!(
                "Provider:   {}\nHost:       {}\nDatabase:   {}\nConnection: {}",
                options.provider(),
                host,
                options.database_name().unwrap_or("-"),
                options.connection_string()
            ))
        }
        CommandType::Describe {
            profile,
            table,
            schema,
            json,
        } => {
            let options = state.options(Some(profile.as_str()))?;
            let mut introspector = Introspector::connect(&options, &ConnectionOverrides::default()).await?;
            let Some(descriptor) = introspector.describe_table(table, schema.as_deref(), None).await? else {
                return Ok(format!("Table {} not found in {}", table, introspector.database()));
            };

            if *json {
                Ok(serde_json::to_string_pretty(&descriptor)?)
            } else {
                Ok(format_table(&descriptor))
            }
        }
    }
}

/// Build the routine descriptor for `statement`
///
/// A qualified `schema.name` is split on the last dot.
pub fn routine_from_args(shape: RoutineShape, name: &str, named: bool, parameters: &[ParameterArg]) -> RoutineDescriptor {
    let mut routine = match name.rsplit_once('.') {
        Some((schema, routine)) => RoutineDescriptor::new(routine, shape.kind()).schema(schema),
        None => RoutineDescriptor::new(name, shape.kind()),
    };
    routine = routine.returns_table(shape.returns_table()).named_parameters(named);

    routine.parameters(parameters.iter().map(|p| {
        let parameter = ParameterDescriptor::new(p.name.clone());
        match p.cast {
            Some(ref cast) => parameter.cast_to(cast.clone()),
            None => parameter,
        }
    }))
}

/// Capability matrix of every family
pub fn format_providers() -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Family",
            "Driver",
            "Port",
            "Database",
            "Schema",
            "Named params",
            "Enums",
            "Procedures",
            "Table functions",
        ]);

    let yes_no = |b: bool| if b { "yes" } else { "no" };
    for family in ProviderFamily::ALL {
        table.add_row(vec![
            family.to_string(),
            family.default_invariant_name().to_string(),
            family.default_port().to_string(),
            family.default_database_name().unwrap_or("-").to_string(),
            family.default_schema_name().unwrap_or("-").to_string(),
            yes_no(family.supports_named_parameters()).to_string(),
            yes_no(family.supports_enums()).to_string(),
            yes_no(family.supports_routine_type(RoutineKind::StoredProcedure)).to_string(),
            yes_no(family.routine_can_return_table(RoutineKind::StoredFunction)).to_string(),
        ]);
    }
    table.to_string()
}

/// Column listing for a described table
pub fn format_table(descriptor: &TableDescriptor) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Column", "Type", "Nullable", "Default", "Runtime type"]);

    for column in descriptor.columns() {
        let runtime = column
            .runtime_type()
            .map(|t| format!("{:?}", t))
            .unwrap_or_else(|_| "?".to_string());
        let data_type = match column.udt_qualified_name() {
            Some(udt) if column.is_user_defined_type() || column.is_array() => {
                format!("{} ({})", column.data_type, udt)
            }
            _ => column.data_type.clone(),
        };
        table.add_row(vec![
            column.ordinal_position.to_string(),
            column.name.clone(),
            data_type,
            if column.is_nullable { "yes" } else { "no" }.to_string(),
            column.default_value.clone().unwrap_or_default(),
            runtime,
        ]);
    }

    let mut output = format!("{}\n{}", descriptor.qualified_name(), table);
    for (name, columns) in descriptor.unique_constraints() {
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        output.push_str(&format!("\nUnique {}: ({})", name, names.join(", ")));
    }
    output
}

/// Format an error for display
pub fn format_error(error: &DbMetaError) -> String {
    format!("Error: {}", error)
}

const HELP: &str = r#"
dbmeta: database metadata and routine statement synthesis

Commands:
  providers                          Show the capability matrix of every provider family
  statement <family> <shape> <name> [--named] [param[:cast_type] ...]
                                     Print the statement invoking a routine
                                     (shape: procedure, function, table-function)
  connection <profile>               Show the resolved, masked connection of a profile
  describe <profile> <table> [schema] [--json]
                                     Describe a table through a configured profile
  help                               Show this help message
  version                            Show the version

Profiles are read from the dbmeta/config.toml file in the user configuration
directory. DBMETA_<PROFILE>_PASSWORD and DBMETA_<PROFILE>_CONNECTION_STRING
override stored values.

Examples:
  dbmeta statement postgresql procedure some_schema.some_routine p_some_int p_some_enum:some_enum
  dbmeta statement mssql table-function dbo.orders_by_day --named p_day
  dbmeta describe clinic patient public --json
"#;
