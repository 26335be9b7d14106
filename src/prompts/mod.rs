//! Prompt templates for the three script-generation stages.
//!
//! Every generated script shares one contract: all file I/O happens under
//! the fixed workspace mount, and the only thing worth printing to stdout
//! is a single-line JSON result. The per-stage builders below describe the
//! scrape, clean, and analyze tasks against that contract.

use crate::workspace::{CLEAN_CSV_FILE, MOUNT_POINT, SCRAPED_TABLE_FILE};

/// Prompt pair for one code-generation request.
#[derive(Debug, Clone)]
pub struct CodegenPrompt {
    /// System prompt establishing the script-writer role and the workspace
    /// contract.
    pub system: String,
    /// User prompt carrying the stage-specific task.
    pub user: String,
}

/// Builds the code-generation prompt for a stage task.
pub fn build_codegen_prompt(task: &str) -> CodegenPrompt {
    let system = format!(
        "You are an expert Python data scientist. Your task is to write a Python script \
         to perform a specific task.\n\
         All file operations must use the '{MOUNT_POINT}/' directory.\n\
         Write only the Python code for this task. Do not use markdown.\n\
         Your script's final output to stdout should be a single-line JSON string \
         describing the result."
    );

    CodegenPrompt {
        system,
        user: format!("Your current task:\n'{task}'"),
    }
}

/// Task description for stage 1: download the page and save the raw table.
pub fn scrape_task(url: &str) -> String {
    format!(
        "Download the page at '{url}' using requests with a 'User-Agent' header. \
         Find the main data table (the one with 'Rank' and 'Title' in its headers). \
         Save the full outer HTML of this table to '{MOUNT_POINT}/{SCRAPED_TABLE_FILE}'."
    )
}

/// Task description for stage 2: parse and clean the table into a CSV.
pub fn clean_task() -> String {
    format!(
        "Read the HTML from '{MOUNT_POINT}/{SCRAPED_TABLE_FILE}'. Parse it to a pandas \
         DataFrame. \
         CRITICAL: Before saving, you must aggressively clean the 'Worldwide gross' column. \
         First, remove specific leading footnote characters that are sometimes attached to \
         the numbers (e.g., 'T', 'F', 'SM', 'F8'). \
         After removing those, then remove all other non-numeric characters like '$', ',', \
         '#', '[', ']', and extra spaces. \
         Finally, save the fully cleaned DataFrame (Rank, Peak, Title, Worldwide gross, Year) \
         to a CSV file at '{MOUNT_POINT}/{CLEAN_CSV_FILE}'."
    )
}

/// Task description for stage 3: answer the user's question from the CSV.
pub fn analyze_task(question: &str) -> String {
    format!(
        "The film data is at '{MOUNT_POINT}/{CLEAN_CSV_FILE}'. Load it into a pandas \
         DataFrame. \
         The columns should already be clean, but as a safeguard, ensure 'Worldwide gross', \
         'Year', and 'Peak' are numeric types (`pd.to_numeric` with `errors='coerce'`). \
         Drop any rows with NaN values. \
         The column with the film names is 'Title'. \
         Now, write a single script to produce the final answers for the user's request.\n\n\
         User Request:\n---\n{question}\n---\n\
         The script's final output to stdout MUST be a single line containing a valid JSON \
         array with exactly 4 elements matching the user's questions. \
         The 4th element must be a base64-encoded PNG image as a data URI string."
    )
}
