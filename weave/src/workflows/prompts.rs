//! Prompt text for every LLM turn in the Analyze and Modify workflows.
//!
//! Structured-call prompts describe the expected JSON shape in prose and
//! never show fenced examples: the structured client assumes raw JSON
//! output, and fences in the surrounding instructions leak into replies.

pub const INITIAL_PARSE_SYSTEM: &str = "\
You parse a free-form analysis request. Extract the repository URL and what \
the user wants done. Respond with raw JSON only, no markdown fences, in one \
of two shapes: \
{\"status\":\"success\",\"repoUrl\":\"...\",\"userRequest\":\"...\",\"requirements\":null,\"externalDocsUrl\":null} \
when a repository URL is present, or {\"status\":\"failed\",\"reason\":\"...\"} \
when it is not. requirements, when the request spells them out, is \
{\"summary\":\"...\",\"constraints\":[...],\"acceptanceCriteria\":[...]}; \
externalDocsUrl is any linked document the user wants considered.";

pub const REQUIREMENTS_SYSTEM: &str = "\
You extract requirements from an external document. Use the fetch-url tool \
to retrieve the document, then summarize the requirements that matter for \
the user's request in plain text.";

pub const REQUIREMENTS_PARSE_SYSTEM: &str = "\
Convert the requirement notes into raw JSON only, no markdown fences, shaped \
as {\"summary\":\"...\",\"constraints\":[\"...\"],\"acceptanceCriteria\":[\"...\"]}.";

pub fn repo_analysis_system(tool_soft_cap: usize) -> String {
    format!(
        "You analyze a repository checkout. Use the get-file-tree, \
         read-file-content and search-in-files tools to gather evidence \
         before answering; keep it to at most {tool_soft_cap} tool calls. \
         When you have enough evidence, reply with a concise written \
         analysis: what the project is, how it is structured, how it is \
         built and run, and anything relevant to the user's request."
    )
}

pub const ANALYSIS_PARSE_SYSTEM: &str = "\
Convert the analysis notes into raw JSON only, no markdown fences, shaped as \
{\"tldr\":\"...\",\"analysis\":\"...\",\"userRequestAnalysis\":null,\"repositoryReview\":null,\"containerEnv\":null}. \
containerEnv, when the notes identify how to build and run the project, is \
{\"baseImage\":\"...\",\"buildCommand\":\"...\",\"runCommand\":\"...\",\"port\":null,\"notes\":null}.";

pub fn plan_system(tool_soft_cap: usize) -> String {
    format!(
        "You plan a code change. Use the get-file-tree, read-file-content and \
         search-in-files tools to understand the codebase; keep it to at \
         most {tool_soft_cap} tool calls. When you understand the change, \
         reply with a written plan: what to modify, in which files, and how \
         the result should be verified."
    )
}

pub const PLAN_PARSE_SYSTEM: &str = "\
Convert the plan notes into raw JSON only, no markdown fences, shaped as \
{\"modificationPlan\":\"...\",\"filesToModify\":[\"path\"],\"dependencies\":[\"...\"],\"containerEnv\":null}. \
containerEnv, when the notes identify how to build and test the project, is \
{\"baseImage\":\"...\",\"buildCommand\":\"...\",\"runCommand\":\"...\",\"port\":null,\"notes\":null}.";

pub const MODIFY_SYSTEM: &str = "\
You apply a code-change plan to the checkout. Use read-file-content to see \
current content, apply-patch or apply-patches for line-range edits \
(startLine and endLine are 1-indexed and inclusive; when sending several \
patches for one file, compute every line number against the original file), \
create-file for new files and delete-file for removals. When every edit is \
applied, reply with a summary of what changed.";

pub const MODIFY_PARSE_SYSTEM: &str = "\
Convert the change summary into raw JSON only, no markdown fences, shaped \
as {\"filesModified\":[\"path\"],\"summary\":\"...\"}.";

pub fn verify_system(build_command: &str, run_command: &str) -> String {
    format!(
        "You verify the change in a container. Invoke the tools strictly in \
         this order: container-available, then generate-dockerfile, then \
         build-image, then run-container with the image name build-image \
         returned and the command {run_command:?}, then cleanup-container \
         with the same image name even if the run failed. The build command \
         is {build_command:?}. After cleanup, reply with one line stating \
         whether verification passed."
    )
}

pub const VERIFY_PARSE_SYSTEM: &str = "\
You read a verification tool log. Convert it into raw JSON only, no \
markdown fences, shaped as {\"success\":true,\"commandExecuted\":\"...\",\"exitCode\":0,\"logs\":[\"...\"],\"errorMessage\":null}. \
success is true only when the container run exited 0; errorMessage carries \
the failing log lines otherwise.";

pub const COMMIT_MESSAGE_SYSTEM: &str = "\
Write a one-line conventional-commit message (type: subject) for the \
described change. Reply with the message only.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_prompts_never_contain_markdown_fences() {
        for prompt in [
            INITIAL_PARSE_SYSTEM,
            REQUIREMENTS_PARSE_SYSTEM,
            ANALYSIS_PARSE_SYSTEM,
            PLAN_PARSE_SYSTEM,
            MODIFY_PARSE_SYSTEM,
            VERIFY_PARSE_SYSTEM,
        ] {
            assert!(!prompt.contains("```"), "fences leak into structured replies: {prompt}");
        }
    }

    #[test]
    fn tool_loop_prompts_state_the_soft_cap() {
        assert!(repo_analysis_system(15).contains("at most 15 tool calls"));
        assert!(plan_system(7).contains("at most 7 tool calls"));
    }
}
