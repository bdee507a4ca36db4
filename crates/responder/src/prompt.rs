//! Deterministic prompt assembly (C6, spec §4.5). No templating engine —
//! a single ordered string builder, matching the original's large
//! f-string responder prompts.

use flowline_flow::{HistoryTurn, Role, TransitionOption};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;

pub struct PromptInput<'a> {
    pub pending_field: Option<&'a str>,
    pub prompt_text: Option<&'a str>,
    pub allowed_values: Option<&'a [String]>,
    pub user_message: &'a str,
    pub answers: &'a HashMap<String, Value>,
    pub recent_history: &'a [HistoryTurn],
    pub available_edges: &'a [TransitionOption],
    pub available_paths: &'a [String],
    pub active_path: Option<&'a str>,
    pub admin: bool,
    pub communication_style: &'a str,
    pub project_description: &'a str,
    pub target_audience: &'a str,
}

const MAX_RECENT_TURNS: usize = 5;

/// Build the turn prompt: role header → current question / pending
/// field / user message → answers summary → bounded recent history →
/// path hints → navigation options → allowed-values constraint → tool
/// selection rules → format reminder.
pub fn build_prompt(input: &PromptInput) -> String {
    let mut prompt = String::new();

    writeln!(prompt, "Voce e um assistente de atendimento conduzindo uma conversa guiada por um fluxo autorado.").ok();
    if !input.project_description.is_empty() {
        writeln!(prompt, "Contexto do projeto: {}", input.project_description).ok();
    }
    if !input.target_audience.is_empty() {
        writeln!(prompt, "Publico-alvo: {}", input.target_audience).ok();
    }
    if !input.communication_style.is_empty() {
        writeln!(prompt, "Estilo de comunicacao: {}", input.communication_style).ok();
    }

    prompt.push('\n');
    match (input.pending_field, input.prompt_text) {
        (Some(field), Some(text)) => {
            writeln!(prompt, "Campo pendente: {field}").ok();
            writeln!(prompt, "Pergunta atual: {text}").ok();
        }
        _ => {
            writeln!(prompt, "No atual e uma decisao; nenhum campo pendente.").ok();
        }
    }
    writeln!(prompt, "Mensagem do usuario: {}", input.user_message).ok();

    prompt.push('\n');
    writeln!(prompt, "Respostas ja coletadas:").ok();
    if input.answers.is_empty() {
        writeln!(prompt, "  (nenhuma ainda)").ok();
    } else {
        let mut keys: Vec<&String> = input.answers.keys().collect();
        keys.sort();
        for key in keys {
            writeln!(prompt, "  {key} = {}", input.answers[key]).ok();
        }
    }

    prompt.push('\n');
    writeln!(prompt, "Historico recente:").ok();
    let start = input.recent_history.len().saturating_sub(MAX_RECENT_TURNS);
    for turn in &input.recent_history[start..] {
        let role = match turn.role {
            Role::User => "usuario",
            Role::Assistant => "assistente",
            Role::System => "sistema",
        };
        writeln!(prompt, "  [{role}] {}", turn.content).ok();
    }

    if let Some(active_path) = input.active_path {
        writeln!(prompt, "\nCaminho ativo: {active_path}").ok();
    }
    if !input.available_paths.is_empty() {
        writeln!(prompt, "Caminhos disponiveis: {}", input.available_paths.join(", ")).ok();
    }

    prompt.push('\n');
    writeln!(prompt, "Opcoes de navegacao disponiveis:").ok();
    for edge in input.available_edges {
        let description = edge.description.as_deref().unwrap_or("(sem descricao)");
        writeln!(
            prompt,
            "  -> {} [{description}] satisfeito={}",
            edge.target, edge.guard_satisfied
        )
        .ok();
    }

    if let Some(allowed) = input.allowed_values {
        writeln!(prompt, "\nValores permitidos para este campo: {}", allowed.join(", ")).ok();
        writeln!(prompt, "Se a resposta do usuario nao corresponder exatamente, escolha o valor mais proximo da lista.").ok();
    }

    prompt.push('\n');
    writeln!(prompt, "Regras de selecao de ferramenta:").ok();
    writeln!(prompt, "  - Use a ferramenta PerformAction com uma sequencia ordenada de acoes.").ok();
    writeln!(prompt, "  - Use RequestHumanHandoff apenas para escalar explicitamente para um humano.").ok();
    if input.admin {
        writeln!(prompt, "  - Use ModifyFlowLive apenas quando o solicitante for administrador (confirmado).").ok();
    } else {
        writeln!(prompt, "  - ModifyFlowLive nao esta disponivel; o solicitante nao e administrador.").ok();
    }

    writeln!(
        prompt,
        "\nResponda APENAS com um objeto JSON contendo os campos \"tools\" e \"reasoning\". As mensagens para o usuario vao no campo \"messages\" de cada ferramenta, nunca como texto livre."
    )
    .ok();

    prompt
}

/// Append a schema-correction hint carrying up to the first three
/// validation errors, verbatim (§4.5).
pub fn append_schema_hint(mut prompt: String, errors: &[String]) -> String {
    prompt.push_str("\n\nA resposta anterior nao seguiu o schema exigido. Erros encontrados:\n");
    for error in errors.iter().take(3) {
        prompt.push_str("  - ");
        prompt.push_str(error);
        prompt.push('\n');
    }
    prompt.push_str("Corrija e responda novamente apenas com o objeto JSON valido.\n");
    prompt
}

/// Build the feedback prompt re-invoking the responder with an external
/// action's real outcome (§4.7).
pub fn build_feedback_prompt(
    action_name: &str,
    success: bool,
    result_message: &str,
    error: Option<&str>,
    user_instruction: &str,
    draft_messages: &[String],
) -> String {
    let mut prompt = String::new();
    writeln!(prompt, "Uma acao externa foi executada e voce precisa informar o resultado real ao usuario.").ok();
    writeln!(prompt, "Acao: {action_name}").ok();
    writeln!(prompt, "Status: {}", if success { "SUCCESS" } else { "FAILED" }).ok();
    writeln!(prompt, "Resultado: {result_message}").ok();
    if let Some(error) = error {
        writeln!(prompt, "Erro tecnico: {error}").ok();
    }
    writeln!(prompt, "Instrucao original do usuario: {user_instruction}").ok();
    if !draft_messages.is_empty() {
        writeln!(prompt, "Rascunho de mensagens antes do resultado ser conhecido:").ok();
        for message in draft_messages {
            writeln!(prompt, "  - {message}").ok();
        }
    }
    writeln!(
        prompt,
        "Responda com um objeto JSON PerformAction cujas mensagens reflitam HONESTAMENTE se a acao teve sucesso ou falhou."
    )
    .ok();
    prompt
}
