//! Prompts for challan field extraction.
//!
//! Both prompts are sent with every page: the system string first, then the
//! page image, then the field instruction. Keeping them here (rather than
//! inline in the model clients) means every backend sends identical text and
//! tests can inspect the contract without calling a model.
//!
//! Callers can override either prompt via
//! [`crate::config::ExtractionConfig::prompts`].

use serde::{Deserialize, Serialize};

/// Role/system instruction.
pub const SYSTEM_PROMPT: &str = "You are an expert in reading Indian Delivery Challans.
Your task is to extract structured information from delivery challans.";

/// The 15 record keys, in the order the model is asked for them.
pub const FIELD_NAMES: [&str; 15] = [
    "Date of Pullback",
    "Date of Invoice",
    "Date of Delivery",
    "Invoice No. Challan No.",
    "SC No.",
    "LR No.",
    "Equipment Name",
    "Serial No. of main unit",
    "Qty of Units",
    "Qty of Probes",
    "Pick up address",
    "Status",
    "Delivery Location",
    "Serial No. of Probes",
    "Serial Nos.",
];

/// Field-extraction instruction with the output-format contract.
pub const FIELD_PROMPT: &str = r#"You are reading an Indian Delivery Challan PDF.

Extract the following fields in a JSON list of one object with these exact keys:

- "Date of Pullback": Leave blank if not available
- "Date of Invoice": The date mentioned as Invoice Date
- "Date of Delivery": Leave blank if not available
- "Invoice No. Challan No.": Value next to 'Invoice#'
- "SC No.": Value next to 'SC#'
- "LR No.": Value next to 'L.R.No.' if found
- "Equipment Name": Product or equipment name from the Description (e.g., Logiq P9)
- "Serial No. of main unit": Serial number(s) of the main equipment
- "Qty of Units": Quantity under the 'Qty' field for main unit
- "Qty of Probes": Count of distinct probe models mentioned in description
- "Pick up address": Address from the “Dispatched From” or Customer section
- "Status": Leave blank
- "Delivery Location": Address under “Place of Delivery” section
- "Serial No. of Probes": List of individual serial numbers for all probes
- "Serial Nos.": All serial numbers mentioned in the goods description

Return only a JSON array with one object containing these keys.
If a field is not clearly available, return it as an empty string "".
Do not include any extra text, explanation, or markdown formatting."#;

/// The two instruction strings sent with every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPair {
    /// Sent before the page image.
    pub system: String,
    /// Sent after the page image.
    pub user: String,
}

impl Default for PromptPair {
    fn default() -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            user: FIELD_PROMPT.to_string(),
        }
    }
}
