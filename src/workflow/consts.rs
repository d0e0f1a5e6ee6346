// Output keys read by the dispatcher.
pub const BRANCH_HANDLE: &str = "branchHandle";
pub const ITERATION_COMPLETE: &str = "iterationComplete";
pub const CURRENT_ITEM: &str = "currentItem";
pub const LOOP_INDEX: &str = "index";
pub const OUTPUT_VARIABLE: &str = "outputVariable";

// Edge handles.
pub const DEFAULT_HANDLE: &str = "default";
pub const TRUE_HANDLE: &str = "true";
pub const FALSE_HANDLE: &str = "false";
pub const LOOP_BODY_HANDLE: &str = "body";
pub const LOOP_DONE_HANDLE: &str = "done";

// Variable names used when a node config leaves them out.
pub const DEFAULT_LLM_OUTPUT: &str = "llmResponse";
pub const DEFAULT_ITEM_VARIABLE: &str = "currentItem";

/// Variable-store key holding the workflow `env` map.
pub const ENV_VARIABLE: &str = "env";

/// Loop config key bounding the iterations of one loop run.
pub const MAX_ITERATIONS: &str = "maxIterations";
