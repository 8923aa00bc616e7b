// src/claims/prompts.rs — System prompts and user-message builders for document stages

use super::types::Claim;

pub const EXTRACTION_SYSTEM_PROMPT: &str = "\
You extract testable claims from specification and policy documents.

Read the document and list every concrete assertion it makes about how the \
system behaves, stores data, protects data, or is operated. Split compound \
statements into separate claims. Do not invent claims the document does not make.

Respond with ONLY a JSON array, no prose, no markdown. Each element:
{
  \"id\": \"C1\",                 // unique, sequential
  \"section\": \"2.1\",           // heading or section the claim came from
  \"category\": \"data-privacy\" | \"security\" | \"functionality\" | \"operational\" | \"legal\",
  \"severity\": \"critical\" | \"high\" | \"medium\" | \"low\",
  \"text\": \"The service deletes account data within 30 days of a deletion request.\",
  \"testable\": true              // false when no codebase could confirm or refute it
}";

pub const VERIFY_SYSTEM_PROMPT: &str = "\
You audit a codebase against claims made about it.

For each claim, decide from the supplied source files whether the code \
implements it:
  PASS     the code clearly implements the claim
  PARTIAL  the code implements part of it, or only in some paths
  FAIL     the code contradicts the claim or the behavior is absent
  N/A      the claim cannot be checked against code (legal text, process)

Cite evidence only from the files shown. Respond with ONLY a JSON array, one \
element per claim, no prose:
{
  \"claimId\": \"C1\",
  \"verdict\": \"PASS\" | \"PARTIAL\" | \"FAIL\" | \"N/A\",
  \"evidence\": [{\"file\": \"src/db.rs\", \"lineNumber\": 42, \"snippet\": \"...\", \"confidence\": 0.9}],
  \"reasoning\": \"one or two sentences\"
}";

pub const REGENERATE_SYSTEM_PROMPT: &str = "\
You revise specification documents so they describe what a codebase actually does.

You receive the current document and a gap report listing claims that failed \
or only partially held when checked against the code. Rewrite the document so \
every statement is accurate: correct or qualify failed claims, narrow partial \
ones, keep passing ones unchanged. Preserve the structure and headings.

Respond with ONLY the full revised document in markdown.";

pub const GENERATE_SYSTEM_PROMPT: &str = "\
You write specification documents.

Given a short description, write a complete markdown specification with \
numbered sections. State behavior as concrete, checkable assertions (what is \
stored, for how long, who can access it, what happens on failure).

Respond with ONLY the document in markdown.";

pub fn extraction_message(document: &str, document_type: &str) -> String {
    format!("Document type: {document_type}\n\n---\n{document}\n---")
}

pub fn verify_message(claims: &[&Claim], context: &str) -> String {
    let mut msg = String::with_capacity(context.len() + claims.len() * 160);
    msg.push_str("## Claims\n\n");
    for c in claims {
        msg.push_str(&format!(
            "- [{}] ({}, {}) {}\n",
            c.id, c.category, c.severity, c.text
        ));
    }
    msg.push_str("\n## Source files\n\n");
    if context.is_empty() {
        msg.push_str("(no source files matched)\n");
    } else {
        msg.push_str(context);
    }
    msg
}

pub fn regenerate_message(document: &str, gap_report: &str) -> String {
    format!("## Current document\n\n{document}\n\n## Gap report\n\n{gap_report}")
}
