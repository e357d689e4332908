//! Routine and parameter descriptors

use serde::{Deserialize, Serialize};

use super::{Provider, RoutineKind};
use crate::error::Result;
use crate::naming::format_qualified_name;
use crate::types::{DbType, DbValue, RuntimeType};

/// How a parameter's value is written into a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValueExpression {
    /// Bare parameter marker
    #[default]
    Raw,
    /// Cast left to the driver's typed binding
    DatabaseTypeCast,
    /// Explicit cast to a named type, e.g. `@p::my_enum`
    CustomTypeCast,
}

/// Parameter direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterDirection {
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

/// A routine parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    name: String,
    value: Option<DbValue>,
    runtime_type: Option<RuntimeType>,
    value_expression: ValueExpression,
    database_type: Option<DbType>,
    custom_type: Option<String>,
    direction: Option<ParameterDirection>,
    size: Option<u32>,
    precision: Option<u8>,
    scale: Option<u8>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            runtime_type: None,
            value_expression: ValueExpression::Raw,
            database_type: None,
            custom_type: None,
            direction: None,
            size: None,
            precision: None,
            scale: None,
        }
    }

    pub fn value(mut self, value: DbValue) -> Self {
        self.value = Some(value);
        self
    }

    /// Override the runtime type inferred from the value
    pub fn runtime_type(mut self, runtime_type: RuntimeType) -> Self {
        self.runtime_type = Some(runtime_type);
        self
    }

    pub fn database_type(mut self, database_type: DbType) -> Self {
        self.database_type = Some(database_type);
        self
    }

    /// Bind with the driver's typed cast for the declared database type
    pub fn database_type_cast(mut self, database_type: DbType) -> Self {
        self.database_type = Some(database_type);
        self.value_expression = ValueExpression::DatabaseTypeCast;
        self
    }

    /// Cast the marker to `type_name` inside the statement
    pub fn cast_to(mut self, type_name: impl Into<String>) -> Self {
        self.custom_type = Some(type_name.into());
        self.value_expression = ValueExpression::CustomTypeCast;
        self
    }

    pub fn direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_value(&self) -> Option<&DbValue> {
        self.value.as_ref()
    }

    /// Explicit runtime type, else the one carried by the value
    pub fn get_runtime_type(&self) -> Option<RuntimeType> {
        self.runtime_type
            .clone()
            .or_else(|| self.value.as_ref().and_then(DbValue::runtime_type))
    }

    pub fn value_expression(&self) -> ValueExpression {
        self.value_expression
    }

    pub fn get_database_type(&self) -> Option<DbType> {
        self.database_type
    }

    pub fn custom_type(&self) -> Option<&str> {
        self.custom_type.as_deref()
    }

    pub fn get_direction(&self) -> Option<ParameterDirection> {
        self.direction
    }

    pub fn get_size(&self) -> Option<u32> {
        self.size
    }

    pub fn get_precision(&self) -> Option<u8> {
        self.precision
    }

    pub fn get_scale(&self) -> Option<u8> {
        self.scale
    }
}

/// A stored procedure or function to call
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineDescriptor {
    schema: Option<String>,
    name: String,
    kind: RoutineKind,
    returns_table: bool,
    use_named_parameters: bool,
    parameters: Vec<ParameterDescriptor>,
}

impl RoutineDescriptor {
    pub fn new(name: impl Into<String>, kind: RoutineKind) -> Self {
        Self {
            schema: None,
            name: name.into(),
            kind,
            returns_table: false,
            use_named_parameters: false,
            parameters: Vec::new(),
        }
    }

    pub fn procedure(name: impl Into<String>) -> Self {
        Self::new(name, RoutineKind::StoredProcedure)
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self::new(name, RoutineKind::StoredFunction)
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn returns_table(mut self, returns_table: bool) -> Self {
        self.returns_table = returns_table;
        self
    }

    pub fn named_parameters(mut self, use_named_parameters: bool) -> Self {
        self.use_named_parameters = use_named_parameters;
        self
    }

    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn parameters(mut self, parameters: impl IntoIterator<Item = ParameterDescriptor>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn routine_name(&self) -> &str {
        &self.name
    }

    /// `schema.name`, or `name` without a schema
    pub fn full_name(&self) -> String {
        format_qualified_name(&[self.schema.as_deref(), Some(&self.name)])
    }

    pub fn kind(&self) -> RoutineKind {
        self.kind
    }

    pub fn is_returning_table(&self) -> bool {
        self.returns_table
    }

    pub fn uses_named_parameters(&self) -> bool {
        self.use_named_parameters
    }

    pub fn get_parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn build_statement(&self, provider: &Provider) -> Result<String> {
        provider.build_statement(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        assert_eq!(RoutineDescriptor::procedure("p").full_name(), "p");
        assert_eq!(
            RoutineDescriptor::function("f").schema("some_schema").full_name(),
            "some_schema.f"
        );
        assert_eq!(RoutineDescriptor::function("f").schema("").full_name(), "f");
    }

    #[test]
    fn test_cast_to_sets_policy_and_type() {
        let parameter = ParameterDescriptor::new("p_kind").cast_to("some_enum");
        assert_eq!(parameter.value_expression(), ValueExpression::CustomTypeCast);
        assert_eq!(parameter.custom_type(), Some("some_enum"));
    }

    #[test]
    fn test_runtime_type_inference() {
        let inferred = ParameterDescriptor::new("p").value(DbValue::I32(1));
        assert_eq!(inferred.get_runtime_type(), Some(RuntimeType::I32));

        let explicit = ParameterDescriptor::new("p")
            .value(DbValue::Null)
            .runtime_type(RuntimeType::Decimal);
        assert_eq!(explicit.get_runtime_type(), Some(RuntimeType::Decimal));

        assert_eq!(ParameterDescriptor::new("p").get_runtime_type(), None);
    }

    #[test]
    fn test_parameter_precision_and_direction() {
        let parameter = ParameterDescriptor::new("p_amount")
            .database_type_cast(DbType::Decimal)
            .precision(18, 4)
            .direction(ParameterDirection::InputOutput);
        assert_eq!(parameter.value_expression(), ValueExpression::DatabaseTypeCast);
        assert_eq!(parameter.get_database_type(), Some(DbType::Decimal));
        assert_eq!(parameter.get_precision(), Some(18));
        assert_eq!(parameter.get_scale(), Some(4));
        assert_eq!(parameter.get_direction(), Some(ParameterDirection::InputOutput));
    }
}
