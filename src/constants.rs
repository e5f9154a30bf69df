// constants file
pub const PROGRAM_NAME: &str = "formula-relay";

/// Prefix for environment overrides, e.g. `FORMULA_RELAY_SERVER__PORT`.
pub const ENV_PREFIX: &str = "FORMULA_RELAY";

pub const DEFAULT_ENDPOINT_PATH: &str = "/api/get-formula";

// Client-facing error messages. These are the only error strings a caller ever sees.
pub const PROMPT_REQUIRED: &str = "Prompt is required";
pub const INVALID_BODY: &str = "Request body must be a JSON object";
pub const METHOD_NOT_ALLOWED: &str = "Method Not Allowed";
pub const BACKEND_FAILED: &str = "Failed to get formula from AI";

pub const INSTRUCTION_PREAMBLE: &str = "You are an expert in Microsoft Excel formulas.
Based on the following user request, provide only the Excel formula as a raw string.
Do not explain it, do not wrap it in quotes, and do not add any extra text.";

pub const DEFAULT_CONFIG_CONTENT: &str = r#"# formula-relay configuration
# Every key can be overridden with an environment variable, e.g.
#   FORMULA_RELAY_SERVER__PORT=8080
#   FORMULA_RELAY_GEMINI_SETTINGS__API_KEY=...

# verbosity = "info"

# "gemini" or "bedrock"
ai_backend = "gemini"

[server]
bind_address = "0.0.0.0"
port = 3001
endpoint_path = "/api/get-formula"
# Set to the add-in's origin to restrict browser callers.
allowed_origin = "*"

[invocation]
timeout_secs = 30
max_retries = 0
retry_backoff_ms = 250

[gemini_settings]
model = "gemini-2.5-flash"
# api_key = "" # falls back to GOOGLE_API_KEY

[aws_settings]
region = "us-east-1"
model_id = "anthropic.claude-3-haiku-20240307-v1:0"
# profile = "default"
"#;
