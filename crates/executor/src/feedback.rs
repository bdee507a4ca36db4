//! The truthfulness heuristic (C11, spec §4.7): after an external action
//! runs and the responder is re-invoked with its real outcome, the
//! resulting user-facing text is checked for an honest marker before it
//! is allowed to go out.

pub const SUCCESS_MARKERS: &[&str] = &["sucesso", "aplicado", "pronto", "feito", "✅"];
pub const FAILURE_MARKERS: &[&str] = &["erro", "falhou", "não foi", "❌"];

/// Case-insensitive substring check against the marker set appropriate
/// to `success`.
pub fn passes_truthfulness_heuristic(success: bool, text: &str) -> bool {
    let lower = text.to_lowercase();
    let markers: &[&str] = if success { SUCCESS_MARKERS } else { FAILURE_MARKERS };
    markers.iter().any(|marker| lower.contains(marker))
}

/// Deterministic fallback used when the responder's feedback-loop reply
/// fails the truthfulness heuristic.
pub fn deterministic_feedback_message(success: bool) -> &'static str {
    if success {
        "Pronto, a alteracao foi aplicada com sucesso."
    } else {
        "Nao foi possivel concluir a solicitacao agora, foi registrado um erro."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_success_text_with_a_positive_marker() {
        assert!(passes_truthfulness_heuristic(true, "Pronto! Sua alteracao foi aplicada com sucesso."));
    }

    #[test]
    fn rejects_success_text_missing_any_marker() {
        assert!(!passes_truthfulness_heuristic(true, "Tudo bem, seguimos em frente."));
    }

    #[test]
    fn accepts_failure_text_with_a_negative_marker() {
        assert!(passes_truthfulness_heuristic(false, "Houve um erro ao aplicar a mudanca."));
    }

    #[test]
    fn rejects_failure_text_that_sounds_like_success() {
        assert!(!passes_truthfulness_heuristic(false, "Tudo certo por aqui!"));
    }
}
