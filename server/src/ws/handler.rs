use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::state::AppState;
use crate::ws::actor;

/// Query parameter carrying the client identity.
pub const USER_ID_PARAM: &str = "userID";

/// The first `userID` value in the query, if present and non-empty.
/// Later repeats of the parameter are ignored.
pub fn admission_identity(params: Vec<(String, String)>) -> Option<String> {
    params
        .into_iter()
        .find(|(key, _)| key == USER_ID_PARAM)
        .map(|(_, value)| value)
        .filter(|id| !id.is_empty())
}

/// GET /ws?userID=<id>
/// WebSocket upgrade endpoint. The identity is checked before the upgrade:
/// a missing or empty `userID` gets 400 and no connection is established.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(user_id) = admission_identity(params) else {
        tracing::warn!("WebSocket admission rejected: missing userID");
        return (StatusCode::BAD_REQUEST, "Missing userID").into_response();
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!(
                user_id = %user_id,
                error = %rejection,
                "WebSocket upgrade failed"
            );
            return rejection.into_response();
        }
    };

    tracing::info!(user_id = %user_id, "WebSocket connection accepted");
    ws.on_upgrade(move |socket| handle_admitted(socket, state, user_id))
}

/// Handle an upgraded WebSocket connection by running its actor.
async fn handle_admitted(socket: WebSocket, state: AppState, user_id: String) {
    actor::run_connection(socket, state, user_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_first_user_id_wins() {
        let params = pairs(&[("userID", "alice"), ("userID", "bob")]);
        assert_eq!(admission_identity(params), Some("alice".to_string()));
    }

    #[test]
    fn test_empty_first_user_id_is_missing() {
        let params = pairs(&[("userID", ""), ("userID", "bob")]);
        assert_eq!(admission_identity(params), None);
    }

    #[test]
    fn test_other_params_ignored() {
        let params = pairs(&[("theme", "dark"), ("userID", "carol")]);
        assert_eq!(admission_identity(params), Some("carol".to_string()));
        assert_eq!(admission_identity(pairs(&[("userid", "x")])), None);
    }
}
