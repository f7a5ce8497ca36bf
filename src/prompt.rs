//! Fixed prompt skeleton for the code-generation model.
//!
//! Three substitution slots, filled verbatim. The model sees exactly what the
//! client sent; no escaping or sanitization happens here.

pub fn render_prompt(input_text: &str, time_complexity: &str, language: &str) -> String {
    format!(
        "Generate code for description:\n\n\
         Description: '{input_text}'\n\n\
         Time Complexity: {time_complexity}\n\n\
         in Programming Language: {language}\n\n"
    )
}
