//! Prompt construction for script generation

use stepwright_common::TargetEnvironment;

/// Instructions given to the agent for every generation
pub const SYSTEM_PROMPT: &str = "You are a meticulous test automation engineer. Your task is to turn a tabular manual test into a robust, reliable Playwright test. Work like a careful human tester, not a replay machine.

1. EXECUTE EVERY STEP: Carry out each step of the CSV table in order using the browser tools.

2. HANDLE INTERRUPTIONS: Pages are unpredictable. Watch for unexpected elements such as cookie consent banners, login dialogs or promotional overlays. When one appears, dismiss it (for example click 'Accept' or 'Reject') before continuing with the next step. If you had to dismiss something, the final script MUST contain that interaction. If nothing appeared, the final script MUST NOT contain it.

3. VALIDATE EXPECTED RESULTS: For every step that has an 'Expected Result':
* First read the ACTUAL value from the page with a tool call (for example the text of an element).
* Then write an `expect()` assertion comparing the ACTUAL value against the EXPECTED value from the CSV.
* NEVER ADJUST AN ASSERTION TO MAKE IT PASS. If the actual value differs from the expected value, the assertion must still check for the expected value from the CSV. The test is supposed to fail in that case.
* Do not copy the expected value into an assertion without having checked the page first.

4. STABILITY:
- Use appropriate waits and assertions.
- If a step cannot be executed, explain why in a comment in the script.

5. FINISH:
* Execute all steps, including any interruptions you had to handle.
* Close the browser.
* After the browser is closed, reply with ONLY the complete, runnable Playwright TypeScript test (starting with `import`). No prose, no markdown, no partial output. The script must reproduce every tool call you made, including the ones that handled interruptions.";

/// Header placed before the step table
pub const STEPS_PREAMBLE: &str = "Here are the test steps to execute in CSV format:\n\n";

/// Build the user message: optional environment block, then the step table.
///
/// This is the only place the environment password is written out. The
/// returned text must not be logged or persisted.
pub fn build_user_message(steps_table: &str, environment: Option<&TargetEnvironment>) -> String {
    let mut message = String::new();

    if let Some(env) = environment {
        message.push_str("Environment:\n\nURL: ");
        message.push_str(&env.base_url);
        message.push_str("\n\nUsername: ");
        message.push_str(&env.username);
        message.push_str("\n\nPassword: ");
        message.push_str(env.password.expose());
        message.push_str("\n\n");
    }

    message.push_str(STEPS_PREAMBLE);
    message.push_str(steps_table);
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwright_common::Secret;

    const TABLE: &str = "Action,Data,Expected Result\nOpen,https://example.com,\n";

    #[test]
    fn test_message_without_environment() {
        let msg = build_user_message(TABLE, None);
        assert!(msg.starts_with(STEPS_PREAMBLE));
        assert!(msg.ends_with(TABLE));
        assert!(!msg.contains("Environment:"));
    }

    #[test]
    fn test_environment_is_prepended() {
        let env = TargetEnvironment {
            id: Some(1),
            name: "staging".to_string(),
            base_url: "https://staging.example.com".to_string(),
            username: "qa".to_string(),
            password: Secret::new("pw123"),
        };
        let msg = build_user_message(TABLE, Some(&env));

        let env_pos = msg.find("URL: https://staging.example.com").unwrap();
        let steps_pos = msg.find(STEPS_PREAMBLE).unwrap();
        assert!(env_pos < steps_pos);
        assert!(msg.contains("Username: qa"));
        assert!(msg.contains("Password: pw123"));
    }

    #[test]
    fn test_system_prompt_directives() {
        assert!(SYSTEM_PROMPT.contains("NEVER ADJUST AN ASSERTION"));
        assert!(SYSTEM_PROMPT.contains("Close the browser"));
        assert!(SYSTEM_PROMPT.contains("ONLY the complete, runnable"));
    }
}
