//! Embedded script interpreters.
//!
//! A script defines a function that takes the inputs object and returns a
//! JSON-compatible value. The first function defined in the source is called.

use regex::Regex;
use rquickjs::{Context as JsContext, FromJs, Runtime as JsRuntime};
use rustpython_vm::{
    AsObject, Interpreter, PyObjectRef, VirtualMachine,
    builtins::{PyDict, PyFloat, PyInt, PyList, PyStr},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NodeExecutionError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Language {
    Javascript,
    Python3,
}

impl Language {
    pub fn run(
        &self,
        code: &str,
        inputs: Value,
    ) -> Result<Value, NodeExecutionError> {
        match self {
            Language::Javascript => JavascriptRunner::run(code, inputs),
            Language::Python3 => PythonRunner::run(code, inputs),
        }
    }
}

fn script_error(
    code: &str,
    message: impl std::fmt::Display,
) -> NodeExecutionError {
    NodeExecutionError::config(format!("{}: {}", code, message))
}

fn function_name(
    pattern: &str,
    code: &str,
) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(code).map(|caps| caps[1].to_string())
}

pub struct JavascriptRunner;

impl JavascriptRunner {
    pub fn run(
        code: &str,
        inputs: Value,
    ) -> Result<Value, NodeExecutionError> {
        let func_name = Self::function_name(code).ok_or_else(|| script_error("JS_NO_FUNCTION", "no function found in code"))?;

        let runtime = JsRuntime::new().map_err(|e| script_error("JS_RUNTIME", e))?;
        let ctx = JsContext::full(&runtime).map_err(|e| script_error("JS_RUNTIME", e))?;

        ctx.with(|ctx| {
            let exception_message = |ctx: &rquickjs::Ctx<'_>| {
                rquickjs::Exception::from_js(ctx, ctx.catch()).ok().and_then(|e| e.message()).unwrap_or_default()
            };

            if let Err(rquickjs::Error::Exception) = ctx.eval::<(), _>(code) {
                return Err(script_error("JS_EVAL_ERROR", exception_message(&ctx)));
            }

            let call = format!("JSON.stringify({}({}) ?? null)", func_name, inputs);
            match ctx.eval::<String, _>(call) {
                Ok(json) => serde_json::from_str(&json).map_err(|e| script_error("JS_RESULT", e)),
                Err(rquickjs::Error::Exception) => Err(script_error("JS_EXEC_ERROR", exception_message(&ctx))),
                Err(e) => Err(script_error("JS_EXEC_ERROR", e)),
            }
        })
    }

    fn function_name(code: &str) -> Option<String> {
        function_name(r"function\s+([a-zA-Z_$][a-zA-Z0-9_$]*)\s*\(", code)
    }
}

pub struct PythonRunner;

impl PythonRunner {
    pub fn run(
        code: &str,
        inputs: Value,
    ) -> Result<Value, NodeExecutionError> {
        let func_name = Self::function_name(code).ok_or_else(|| script_error("PY_NO_FUNCTION", "no function found in code"))?;

        Interpreter::without_stdlib(Default::default()).enter(|vm| {
            let scope = vm.new_scope_with_builtins();

            let code_obj =
                vm.compile(code, rustpython_vm::compiler::Mode::Exec, "<node>".to_owned()).map_err(|e| script_error("PY_COMPILE_ERROR", format!("{:?}", e)))?;
            vm.run_code_obj(code_obj, scope.clone()).map_err(|e| script_error("PY_EXEC_ERROR", format!("{:?}", e)))?;

            let func = scope.globals.get_item(&func_name, vm).map_err(|e| script_error("PY_EXEC_ERROR", format!("{:?}", e)))?;
            let args = Self::to_python(vm, &inputs);
            let result = func.call((args,), vm).map_err(|e| script_error("PY_CALL_ERROR", format!("{:?}", e)))?;

            Self::to_json(vm, &result)
        })
    }

    fn function_name(code: &str) -> Option<String> {
        function_name(r"def\s+([a-zA-Z_][a-zA-Z0-9_]*)\s*\(", code)
    }

    fn to_python(
        vm: &VirtualMachine,
        value: &Value,
    ) -> PyObjectRef {
        match value {
            Value::Null => vm.ctx.none(),
            Value::Bool(b) => vm.ctx.new_bool(*b).into(),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => vm.ctx.new_int(i).into(),
                (None, Some(f)) => vm.ctx.new_float(f).into(),
                (None, None) => vm.ctx.none(),
            },
            Value::String(s) => vm.ctx.new_str(s.as_str()).into(),
            Value::Array(items) => vm.ctx.new_list(items.iter().map(|v| Self::to_python(vm, v)).collect()).into(),
            Value::Object(map) => {
                let dict = vm.ctx.new_dict();
                for (k, v) in map {
                    // inserting a str key into a fresh dict does not fail
                    let _ = dict.set_item(k.as_str(), Self::to_python(vm, v), vm);
                }
                dict.into()
            }
        }
    }

    fn to_json(
        vm: &VirtualMachine,
        obj: &PyObjectRef,
    ) -> Result<Value, NodeExecutionError> {
        if vm.is_none(obj) {
            return Ok(Value::Null);
        }
        // bool is a subclass of int
        if obj.fast_isinstance(vm.ctx.types.bool_type) {
            return Ok(Value::Bool(obj.is(&vm.ctx.true_value)));
        }
        if let Some(i) = obj.payload::<PyInt>() {
            if let Ok(n) = i.try_to_primitive::<i64>(vm) {
                return Ok(Value::Number(n.into()));
            }
        }
        if let Some(f) = obj.payload::<PyFloat>() {
            if let Some(n) = serde_json::Number::from_f64(f.to_f64()) {
                return Ok(Value::Number(n));
            }
        }
        if let Some(s) = obj.payload::<PyStr>() {
            return Ok(Value::String(s.as_str().to_string()));
        }
        if let Some(list) = obj.payload::<PyList>() {
            return list.borrow_vec().iter().map(|item| Self::to_json(vm, item)).collect::<Result<Vec<_>, _>>().map(Value::Array);
        }
        if let Some(dict) = obj.payload::<PyDict>() {
            let mut map = serde_json::Map::new();
            for (k, v) in dict {
                let key = k.payload::<PyStr>().map(|s| s.as_str().to_string()).unwrap_or_else(|| format!("{:?}", k));
                map.insert(key, Self::to_json(vm, &v)?);
            }
            return Ok(Value::Object(map));
        }
        Ok(Value::String(format!("{:?}", obj)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::NodeErrorKind;

    #[test]
    fn test_function_names() {
        assert_eq!(JavascriptRunner::function_name("function main() {}"), Some("main".to_string()));
        assert_eq!(JavascriptRunner::function_name("  function  _helper1 ({a}) {}"), Some("_helper1".to_string()));
        assert_eq!(JavascriptRunner::function_name("const x = 1;"), None);
        assert_eq!(PythonRunner::function_name("def process_data(params): pass"), Some("process_data".to_string()));
        assert_eq!(PythonRunner::function_name("x = 1"), None);
    }

    #[test]
    fn test_javascript() {
        let code = r#"
        function main({name, greeting, value}) {
            return { message: greeting + ", " + name + "!", doubled: value * 2 }
        }
        "#;
        let result = Language::Javascript.run(code, json!({"name": "World", "greeting": "Hello", "value": 5})).unwrap();
        assert_eq!(result, json!({"message": "Hello, World!", "doubled": 10}));
    }

    #[test]
    fn test_javascript_undefined_and_throw() {
        let result = Language::Javascript.run("function main() {}", json!({})).unwrap();
        assert_eq!(result, Value::Null);

        let err = Language::Javascript.run("function main() { throw new Error('boom') }", json!({})).unwrap_err();
        assert_eq!(err.kind, NodeErrorKind::ConfigError);
        assert!(err.message.contains("boom"));
    }

    #[test]
    fn test_python() {
        let code = r#"
def process(params):
    numbers = params["numbers"]
    return {"sum": sum(numbers), "count": len(numbers), "big": params["limit"] < 3}
"#;
        let result = Language::Python3.run(code, json!({"numbers": [1, 2, 3], "limit": 10})).unwrap();
        assert_eq!(result, json!({"sum": 6, "count": 3, "big": false}));
    }

    #[test]
    fn test_python_errors() {
        let err = Language::Python3.run("def main(params):\n    return params['missing']\n", json!({})).unwrap_err();
        assert_eq!(err.kind, NodeErrorKind::ConfigError);
        assert!(!err.retryable);

        let err = Language::Python3.run("x = 1", json!({})).unwrap_err();
        assert!(err.message.starts_with("PY_NO_FUNCTION"));
    }
}
