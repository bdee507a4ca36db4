//! Turns a free-text `modify_flow` instruction into a `FlowEdit` batch
//! (C12, spec §4.7). Grounded in the original's `FlowModificationExecutor`,
//! which hands the instruction to a second agent (`FlowChatAgent`) rather
//! than parsing it itself — here that second agent is a dedicated LLM
//! call against the same `LlmProvider` seam the turn runner already uses,
//! constrained to emit a JSON array of `FlowEdit` operations instead of a
//! `PerformAction`.

use crate::flow_mod::FlowEdit;
use flowline_flow::ir::Flow;
use flowline_llm::{CompletionRequest, LlmProvider};
use std::fmt::Write as _;

/// Build the prompt for the flow-edit agent: the current flow definition
/// as JSON, the operator's instruction, and the closed `FlowEdit` schema.
pub fn build_flow_edit_prompt(flow: &Flow, instruction: &str) -> String {
    let flow_json = serde_json::to_string_pretty(flow).unwrap_or_else(|_| "{}".to_string());

    let mut prompt = String::new();
    writeln!(prompt, "Voce e um agente que edita a definicao de um fluxo de conversa a partir de uma instrucao em linguagem natural.").ok();
    writeln!(prompt, "Definicao atual do fluxo (JSON):").ok();
    writeln!(prompt, "{flow_json}").ok();
    writeln!(prompt, "\nInstrucao: {instruction}").ok();
    writeln!(
        prompt,
        "\nResponda APENAS com um array JSON de operacoes, cada uma com o campo \"op\" igual a um de: add_node, update_node, delete_node, add_edge, update_edge, delete_edge, set_entry."
    )
    .ok();
    writeln!(prompt, "Cada operacao deve trazer os demais campos exigidos por esse tipo (ex.: update_node exige \"id\" e \"node\").").ok();
    writeln!(prompt, "Nao inclua texto fora do array JSON.").ok();
    prompt
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_edits(content: &str) -> Result<Vec<FlowEdit>, String> {
    serde_json::from_str(strip_code_fence(content)).map_err(|e| format!("invalid edit batch JSON: {e}"))
}

/// Ask the provider to propose a `FlowEdit` batch for `instruction`
/// against `flow`, with one retry on a malformed response. Never applies
/// the edits itself — the caller still runs them through
/// [`crate::flow_mod::apply_batch`] so compile-validation is the single
/// gate for anything actually landing.
pub async fn propose_edits(
    provider: &dyn LlmProvider,
    model: &str,
    flow: &Flow,
    instruction: &str,
) -> Result<Vec<FlowEdit>, String> {
    let prompt = build_flow_edit_prompt(flow, instruction);

    for attempt in 0..2 {
        let request = CompletionRequest { prompt: prompt.clone(), model: model.to_string(), json_mode: true };
        let completion = provider.complete(&request).await.map_err(|e| e.to_string())?;
        match parse_edits(&completion.content) {
            Ok(edits) if !edits.is_empty() => return Ok(edits),
            Ok(_) if attempt == 1 => return Err("flow-edit agent returned an empty batch".to_string()),
            Err(err) if attempt == 1 => return Err(err),
            _ => continue,
        }
    }

    Err("flow-edit agent produced no usable batch".to_string())
}
