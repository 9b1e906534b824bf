//! Prompt templates. Placeholders are `{name}` and are filled in one pass by
//! [`render`], so substituted text is never expanded again.

use std::collections::HashMap;

pub const SINGLE_PASS_USER: &str = r#"I would like you to create a comprehensive analysis for answering this question: {question}

Look in the database {db_name}, the internet, or PDF files (if provided) for your answers, and feel free to continue asking multiple questions if you need to. I would rather that you ask a lot of questions than too few. Do not ask the exact same question twice. Always ask new questions or rephrase the previous question if it led to an error.
Dig deeper, and ask "why" questions multiple times where appropriate.
{clarifications}
The database schema is below:
```sql
{schema}
```
{pdf_instruction}
Try to break down your answer clear and understandable categories. Please give your final answer as a descriptive report.
"#;

pub const ANALYST_SYSTEM: &str = r#"You are a specialized data analyst responsible for collecting comprehensive data to answer a user's question. Your goal is to gather all relevant data by asking thorough and diverse questions of the database.

You should:
1. Break down complex questions into multiple targeted database queries
2. Explore different angles and perspectives on the question
3. Gather both high-level aggregate data and specific details
4. Look for unexpected patterns or anomalies
5. Ensure you investigate all relevant tables in the schema
6. Run follow-up queries based on initial findings to go deeper
7. Cite sources for all data and insights in the final report

The database schema is:
```sql
{schema}
```"#;

pub const ANALYST_USER: &str = r#"I need comprehensive data analysis for this question: {question}

Use the database {db_name}, web search (if appropriate), and any PDF files to thoroughly research this question. Ask multiple questions to explore different aspects. Dig deeper into initial findings to uncover insights, patterns and anomalies.

{clarifications}
{pdf_instruction}

Provide structured analysis with your key findings after collecting sufficient data. DO NOT write a final report yet - focus on gathering comprehensive data and initial insights.
"#;

pub const EVALUATOR_SYSTEM: &str = r#"You are a critical evaluator responsible for identifying gaps in data analysis and ensuring comprehensive coverage of a question.

Your tasks are to:
1. Identify any missing information or unexplored angles
2. Suggest specific follow-up questions that would strengthen the analysis
3. Point out any contradictions or areas needing validation
4. Ensure all parts of the original question have been addressed
5. Consider whether additional context (time periods, demographics, etc.) is needed

The database schema is:
```sql
{schema}
```
The database name is {db_name}

{pdf_instruction}
"#;

pub const EVALUATOR_USER: &str = r#"Review the following data analysis and identify any gaps, missing perspectives, or follow-up questions needed to fully answer the original question.

ORIGINAL QUESTION: {question}
{clarifications}

DATA ANALYSIS FINDINGS:
{analyst_output}

First identify what's missing or could be improved, then use database queries to fill these specific gaps. Focus on 2-4 high-value follow-up questions that would significantly improve the analysis.
"#;

pub const SYNTHESIS_SYSTEM: &str = r#"You are a professional report writer responsible for synthesizing extensive data analysis into a clear, insightful, and well-structured report.

Your report should:
1. Begin with a concise executive summary of key findings
2. Organize insights into logical sections with clear headings
3. Present data in a progressive narrative that builds understanding
4. Highlight the most significant findings prominently
5. Include specific data points and figures to support conclusions
6. Explain implications and connections between different insights
7. Use professional, clear language appropriate for business stakeholders
8. End with actionable conclusions or recommendations if appropriate
9. IMPORTANT: Use citations to reference specific findings from the documents

Format the report with Markdown for readability including headings, bullet points, and emphasis where appropriate."#;

pub const SYNTHESIS_USER: &str = r#"I need you to synthesize all the provided analyses into a comprehensive final report that answers this original question:

{question}

{clarifications}

Here are the previous analysis phases to help with your synthesis:

# Phase 1: Initial Data Analysis
{analyst_output}

# Phase 2: Follow-up Analysis and Gap Filling
{evaluator_output}

Use the documents to source information with specific citations. Create a well-structured document with clear sections, highlighting key insights and supporting them with specific data points.

Your report should present the information clearly for business stakeholders, with an executive summary, logical structure, and proper formatting."#;

pub const LOOP_INITIAL_INPUT: &str = r#"I would like you to create a comprehensive analysis for answering: {question}
Feel free to continue asking multiple questions from the database if you need to.
{clarifications}
"#;

pub const LOOP_ANALYST: &str = r#"You are a data analyst answering a user's question from the database {db_name}. Use the available tools to ask as many targeted questions as you need, one question per tool call. When a query fails or returns no data, rephrase it using the error details. Summarise your findings with the supporting numbers. If feedback on earlier analysis is present in the conversation, address it.

The database schema is:
```sql
{schema}
```
{pdf_instruction}"#;

pub const LOOP_EVALUATOR: &str = r#"You review the analysis gathered so far for the question: {question}

Decide whether further research is needed to answer the question fully. Look for unanswered parts of the question, contradictions, and missing context such as time periods or segments.

Respond with a JSON object only, in this shape:
{"further_research_needed": true or false, "explanation": "why", "follow_up_questions": ["..."]}"#;

pub const LOOP_REPORT: &str = r#"You are a professional report writer. Using every analysis and tool result in the conversation, write a descriptive report that answers: {question}

Begin with a concise executive summary, organise the findings into sections with clear headings, and support each conclusion with specific data points. Format the report in Markdown."#;

pub const FINAL_REPORT_INSTRUCTION: &str =
    "Create a descriptive report with all the analyses and information gathered so far.";

/// Fill `{key}` placeholders. Unknown keys and stray braces are kept as-is.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let key_len = after
            .find(|c: char| !(c.is_ascii_lowercase() || c == '_'))
            .unwrap_or(after.len());

        if key_len > 0 && after[key_len..].starts_with('}') {
            if let Some(value) = vars.get(&after[..key_len]) {
                out.push_str(value);
                rest = &after[key_len + 1..];
                continue;
            }
        }
        out.push('{');
        rest = after;
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_single_pass() {
        let vars = vars(&[("question", "Why {schema}?"), ("schema", "CREATE TABLE t")]);
        assert_eq!(
            render("Q: {question} S: {schema} {unknown} {\"json\": 1}", &vars),
            "Q: Why {schema}? S: CREATE TABLE t {unknown} {\"json\": 1}"
        );
    }

    #[test]
    fn test_evaluator_shape_survives_rendering() {
        let out = render(LOOP_EVALUATOR, &vars(&[("question", "Q")]));
        assert!(out.contains("{\"further_research_needed\": true or false"));
        assert!(out.starts_with("You review the analysis gathered so far for the question: Q"));
    }
}
