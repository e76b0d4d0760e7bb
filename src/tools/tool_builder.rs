use std::{collections::HashMap, future::Future, sync::Arc};

use serde_json::Value;

use super::{
    errors::{ToolBuilderError, ToolExecutionError},
    tool::{AsyncToolFn, Function, FunctionParameters, Property, Tool, ToolType},
};

#[derive(Default)]
pub struct ToolBuilder {
    function_name: Option<String>,
    function_description: Option<String>,
    function_properties: HashMap<String, Property>,
    function_required: Vec<String>,
    executor: Option<AsyncToolFn>,
}

impl std::fmt::Debug for ToolBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBuilder")
            .field("function_name", &self.function_name)
            .field("function_description", &self.function_description)
            .field("function_properties", &self.function_properties)
            .field("function_required", &self.function_required)
            .field("executor", &self.executor.as_ref().map(|_| "<async_fn>"))
            .finish()
    }
}

impl ToolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name of the function for the tool. (Required)
    pub fn function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    /// Sets the description of the function for the tool. (Required)
    pub fn function_description(mut self, description: impl Into<String>) -> Self {
        self.function_description = Some(description.into());
        self
    }

    /// Adds a property to the function's parameters.
    ///
    /// # parameters
    /// * `name` - The name of the property.
    /// * `property_type` - The JSON schema type of the property (e.g., "string", "number", "boolean").
    /// * `description` - A description of what the property represents.
    pub fn add_property(
        mut self,
        name: impl Into<String>,
        property_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.function_properties.insert(
            name.into(),
            Property {
                property_type: property_type.into(),
                description: description.into(),
                enum_values: None,
            },
        );
        self
    }

    /// Adds a string property restricted to `values`.
    pub fn add_enum_property<I, S>(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.function_properties.insert(
            name.into(),
            Property {
                property_type: "string".into(),
                description: description.into(),
                enum_values: Some(values.into_iter().map(Into::into).collect()),
            },
        );
        self
    }

    /// Marks a property as required. `build` rejects names never added.
    pub fn add_required_property(mut self, name: impl Into<String>) -> Self {
        self.function_required.push(name.into());
        self
    }

    /// Sets the asynchronous executor function for the tool. (Required for building)
    pub fn executor(mut self, exec: AsyncToolFn) -> Self {
        self.executor = Some(exec);
        self
    }

    /// Wraps a plain async closure as the executor.
    pub fn executor_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolExecutionError>> + Send + 'static,
    {
        self.executor(Arc::new(move |args| Box::pin(f(args))))
    }

    /// Consumes the builder and attempts to create a `Tool`.
    ///
    /// # Errors
    /// Returns a `ToolBuilderError` if required fields are missing.
    pub fn build(self) -> Result<Tool, ToolBuilderError> {
        let name = self
            .function_name
            .ok_or(ToolBuilderError::MissingFunctionName)?;
        let description = self
            .function_description
            .ok_or(ToolBuilderError::MissingFunctionDescription)?;
        let executor = self.executor.ok_or(ToolBuilderError::MissingExecutor)?;

        if let Some(unknown) = self
            .function_required
            .iter()
            .find(|r| !self.function_properties.contains_key(*r))
        {
            return Err(ToolBuilderError::UnknownRequiredProperty(unknown.clone()));
        }

        Ok(Tool {
            tool_type: ToolType::Function,
            function: Function {
                name,
                description,
                parameters: FunctionParameters {
                    param_type: "object".to_string(),
                    properties: self.function_properties,
                    required: self.function_required,
                },
            },
            executor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_dummy_executor() -> AsyncToolFn {
        Arc::new(|_args: Value| Box::pin(async { Ok("dummy execution".to_string()) }))
    }

    #[test]
    fn tool_builder_valid_tool() {
        let tool = ToolBuilder::new()
            .function_name("test_tool")
            .function_description("A tool for testing")
            .add_property("param1", "string", "A string parameter")
            .add_required_property("param1")
            .executor(create_dummy_executor())
            .build()
            .unwrap();

        assert_eq!(tool.function.name, "test_tool");
        assert_eq!(
            tool.function.parameters.properties["param1"].property_type,
            "string"
        );
        assert!(tool
            .function
            .parameters
            .required
            .contains(&"param1".to_string()));
    }

    #[test]
    fn tool_builder_missing_name_fails() {
        let err = ToolBuilder::new()
            .function_description("A tool missing a name")
            .executor(create_dummy_executor())
            .build()
            .unwrap_err();
        assert_eq!(err, ToolBuilderError::MissingFunctionName);
    }

    #[test]
    fn tool_builder_missing_description_fails() {
        let err = ToolBuilder::new()
            .function_name("test_tool_no_desc")
            .executor(create_dummy_executor())
            .build()
            .unwrap_err();
        assert_eq!(err, ToolBuilderError::MissingFunctionDescription);
    }

    #[test]
    fn tool_builder_missing_executor_fails() {
        let err = ToolBuilder::new()
            .function_name("test_tool_no_exec")
            .function_description("A tool missing an executor")
            .build()
            .unwrap_err();
        assert_eq!(err, ToolBuilderError::MissingExecutor);
    }

    #[test]
    fn required_property_must_be_declared() {
        let err = ToolBuilder::new()
            .function_name("t")
            .function_description("d")
            .add_required_property("ghost")
            .executor(create_dummy_executor())
            .build()
            .unwrap_err();
        assert_eq!(err, ToolBuilderError::UnknownRequiredProperty("ghost".into()));
    }

    #[tokio::test]
    async fn enum_property_serializes_and_closure_executor_runs() {
        let tool = ToolBuilder::new()
            .function_name("unit")
            .function_description("pick a unit")
            .add_enum_property("unit", "temperature unit", ["celsius", "fahrenheit"])
            .executor_fn(|args| async move {
                Ok(args["unit"].as_str().unwrap_or_default().to_uppercase())
            })
            .build()
            .unwrap();

        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(
            value["function"]["parameters"]["properties"]["unit"]["enum"][1],
            "fahrenheit"
        );
        let out = tool.execute(serde_json::json!({"unit": "celsius"})).await.unwrap();
        assert_eq!(out, "CELSIUS");
    }
}
