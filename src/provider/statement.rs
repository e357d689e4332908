//! Routine call statement synthesis

use tracing::debug;

use super::{ProviderFamily, RoutineDescriptor, RoutineKind, ValueExpression};
use crate::error::{DbMetaError, Result};

/// Build the statement that invokes `routine` in the dialect of `family`
///
/// Parameters become `prefix + name` markers, wrapped in the dialect's cast
/// when they carry a custom type cast and in the named-argument form when
/// the routine uses named parameters.
pub fn build_statement(family: ProviderFamily, routine: &RoutineDescriptor) -> Result<String> {
    let kind = routine.kind();
    let returns_table = routine.is_returning_table();
    let unsupported = || DbMetaError::UnsupportedRoutineCombination {
        family,
        kind,
        returns_table,
    };

    if returns_table && !family.routine_can_return_table(kind) {
        return Err(unsupported());
    }

    let prefix = family.parameter_prefix();
    let arguments = routine
        .get_parameters()
        .iter()
        .map(|parameter| {
            let mut expression = format!("{}{}", prefix, parameter.name());
            if let (ValueExpression::CustomTypeCast, Some(custom_type)) =
                (parameter.value_expression(), parameter.custom_type())
            {
                expression = family.format_casting(&expression, custom_type);
            }
            if routine.uses_named_parameters() {
                expression = family.format_named_parameter(parameter.name(), &expression);
            }
            expression
        })
        .collect::<Vec<_>>()
        .join(", ");

    let name = routine.full_name();
    let statement = match (family, kind, returns_table) {
        (ProviderFamily::PostgreSql | ProviderFamily::MySql, RoutineKind::StoredProcedure, _) => {
            format!("CALL {}({})", name, arguments)
        }
        (ProviderFamily::SqlServer, RoutineKind::StoredProcedure, _) => {
            format!("EXEC {} {}", name, arguments)
        }
        (ProviderFamily::Oracle, RoutineKind::StoredProcedure, _) => {
            format!("BEGIN {}({}); END;", name, arguments)
        }
        (ProviderFamily::PostgreSql | ProviderFamily::SqlServer, RoutineKind::StoredFunction, true) => {
            format!("SELECT * FROM {}({})", name, arguments)
        }
        (ProviderFamily::Oracle, RoutineKind::StoredFunction, true) => {
            format!("SELECT * FROM TABLE({}({}))", name, arguments)
        }
        (ProviderFamily::Oracle, RoutineKind::StoredFunction, false) => {
            format!("SELECT {}({}) FROM DUAL", name, arguments)
        }
        (
            ProviderFamily::PostgreSql
            | ProviderFamily::MySql
            | ProviderFamily::SqlServer
            | ProviderFamily::Sqlite,
            RoutineKind::StoredFunction,
            false,
        ) => format!("SELECT {}({})", name, arguments),
        (ProviderFamily::MySql | ProviderFamily::Sqlite, RoutineKind::StoredFunction, true)
        | (ProviderFamily::Sqlite, RoutineKind::StoredProcedure, _)
        | (ProviderFamily::Generic, _, _) => return Err(unsupported()),
    };

    debug!(family = %family, routine = %name, %statement, "Built routine statement");
    Ok(statement)
}
