use docflow_core::{Document, ReviewVerdict};

pub struct DocumentationPrompts;

impl DocumentationPrompts {
    /// Seeded into the generation step's context log on activation.
    pub fn generator_system() -> &'static str {
        r#"You write customer-facing documentation for a new product.
You will receive internal material about the product: descriptions, feature specs and troubleshooting notes.
Use that material and nothing else. Write in an engaging, confident voice that makes the product shine.
When reviewers send suggestions for a draft, rewrite the whole document with the suggestions applied."#
    }

    /// Instructions for the proofreading model, including the reply schema.
    pub fn reviewer_system() -> &'static str {
        r#"You proofread customer-facing documentation for a new product.

Check that the documentation:
- uses a professional tone
- has no spelling or grammar mistakes
- has no offensive or inappropriate language
- is technically accurate

If it passes every check, reply with an empty suggestion list.
If it does not, give a short explanation and a list of concrete changes.

Reply with JSON only, using this schema:
{
  "explanation": "...",
  "suggestions": ["...", "..."]
}"#
    }

    pub fn product_info(product: &Document) -> String {
        format!("Product Info:\n{} - {}", product.title(), product.content())
    }

    pub fn revision_request(previous: &Document, verdict: &ReviewVerdict) -> String {
        let suggestions = verdict
            .suggestions
            .iter()
            .map(|s| format!("- {}", s))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"The documentation below was rejected by proofreading. Rewrite it with the suggested changes applied.

## Previous Draft
{content}

## Explanation
{explanation}

## Suggestions
{suggestions}"#,
            content = previous.content(),
            explanation = verdict.explanation,
            suggestions = suggestions
        )
    }

    /// Message sent to the proofreading model for one document.
    pub fn review_request(document: &Document) -> String {
        document.content().to_string()
    }
}
