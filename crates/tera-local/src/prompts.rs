//! System instructions for the model-driven capabilities.
//!
//! Planner and evaluator replies are requested as JSON objects; the field
//! names here must match the deserializers in `agents`.

use tera_core::Mode;

fn mode_label(mode: Mode) -> &'static str {
    match mode {
        Mode::Normal => "normal mode: a quick, direct answer",
        Mode::Deep => "deep mode: thorough, multi-round research",
    }
}

pub fn planner_system(mode: Mode) -> String {
    format!(
        "You plan web searches for a research request ({}).\n\
         First reason briefly about which aspects of the request need evidence, \
         then propose between 1 and 5 search queries, scaled to the request:\n\
         - a simple factual question needs 1 or 2 queries;\n\
         - an explanatory question needs 2 or 3;\n\
         - a broad comparison or multi-part topic needs 4 or 5.\n\
         Each query should be specific and target a different angle.\n\
         Reply with a single JSON object and nothing else:\n\
         {{\"thoughts\": \"<your reasoning>\", \"queries\": [\"<query>\", ...]}}",
        mode_label(mode)
    )
}

pub fn summarizer_system() -> &'static str {
    "You are given the title and URL of one web search result.\n\
     Write a short factual summary (2 to 4 sentences) of what that page most likely \
     covers and what it contributes to a research question. \
     Do not invent figures. Reply with plain text only."
}

pub fn follow_up_system(mode: Mode) -> String {
    let stance = match mode {
        Mode::Normal => {
            "Be conservative: the goal is a quick answer, so stop as soon as the findings \
             answer the question."
        }
        Mode::Deep => {
            "Favor depth: continue when the findings are shallow, one-sided, or miss an \
             important part of the question."
        }
    };
    format!(
        "You decide whether a research session has gathered enough evidence ({}).\n\
         You receive the original query and numbered findings so far.\n\
         If a simple factual question is already answered, stop. {}\n\
         When you continue, propose 2 or 3 new, targeted queries that fill specific gaps \
         and do not repeat earlier searches.\n\
         Reply with a single JSON object and nothing else:\n\
         {{\"should_follow_up\": true|false, \"reasoning\": \"<why>\", \"queries\": [\"<query>\", ...]}}",
        mode_label(mode),
        stance
    )
}

pub fn report_system(mode: Mode) -> String {
    let shape = match mode {
        Mode::Normal => {
            "Keep it concise, about 150 to 300 words, with `## Introduction`, \
             `## Key Findings` and `## Conclusion` sections, and answer the query directly."
        }
        Mode::Deep => {
            "Write a detailed report whose length grows with the number of results \
             (at least 500 words for up to 10 results, 1000 for up to 20, 1500 for up to 30, \
             and 2000 or more beyond that). Use `## Introduction`, `## Background`, \
             `## Key Findings`, `## Detailed Analysis`, `## Challenges`, \
             `## Future Implications` and `## Conclusion`, written as paragraphs, \
             comparing sources and calling out disagreements. When the input holds only a \
             slice of the results, write a proportional partial report. When it holds \
             partial reports, merge them into one report without repeating material."
        }
    };
    format!(
        "You turn search findings into a Markdown research report.\n\
         The input starts with `Query:` followed by numbered results \
         (Title, URL, Summary) or by partial reports.\n\
         {shape}\n\
         Use every relevant result and cite it inline as [Title](URL). \
         Stay neutral and do not add claims the results do not support.\n\
         Reply with the Markdown report only."
    )
}
