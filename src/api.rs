use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::{future::Future, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};

use crate::budget::{Invocation, TimeBudget};
use crate::error::{Error, Result};
use crate::models::{BatchEvent, Event, Outcome};
use crate::state::Services;
use crate::{aggregator, mint, trade};

type Reply = (StatusCode, Json<Value>);

fn reply(outcome: Outcome) -> Reply {
    let status = StatusCode::from_u16(outcome.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(outcome.to_json()))
}

/// Runs one pipeline call as its own invocation with a fresh time budget.
async fn invoke<F, Fut>(services: Arc<Services>, rule: String, pipeline: F) -> Reply
where
    F: FnOnce(Arc<Services>, Invocation) -> Fut,
    Fut: Future<Output = Result<Outcome>>,
{
    let invocation = Invocation::new(TimeBudget::new(services.config.invocation_timeout));
    let span = info_span!("invocation", id = invocation.id, rule = %rule);
    let outcome = async {
        match pipeline(services, invocation).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Invocation failed: {}", e);
                Outcome::from(e)
            }
        }
    }
    .instrument(span)
    .await;
    reply(outcome)
}

/// Bodies that do not parse, including unsupported networks, get the error envelope.
fn rejected(rejection: JsonRejection) -> Reply {
    warn!("Rejected request body: {}", rejection.body_text());
    reply(Outcome::from(Error::Validation(rejection.body_text())))
}

type Body<T> = std::result::Result<Json<T>, JsonRejection>;

async fn handle_mint(State(services): State<Arc<Services>>, body: Body<Event>) -> Reply {
    let Json(event) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    let rule = event.payload.metadata.rule.id.clone();
    invoke(services, rule, |s, inv| async move { mint::handle(&s, &inv, event).await }).await
}

async fn handle_trade(State(services): State<Arc<Services>>, body: Body<Event>) -> Reply {
    let Json(event) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    let rule = event.payload.metadata.rule.id.clone();
    invoke(services, rule, |s, inv| async move { trade::handle(&s, &inv, event).await }).await
}

async fn handle_lp_swap(State(services): State<Arc<Services>>, body: Body<BatchEvent>) -> Reply {
    let Json(batch) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    let rule = batch
        .items
        .first()
        .map(|i| i.metadata.rule.id.clone())
        .unwrap_or_default();
    invoke(services, rule, |s, inv| async move { aggregator::handle(&s, &inv, batch).await }).await
}

pub fn router(services: Arc<Services>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Sentinel enricher running" }))
        .route("/mint", post(handle_mint))
        .route("/trade", post(handle_trade))
        .route("/lp-swap", post(handle_lp_swap))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(services)
}

pub async fn serve(services: Arc<Services>) -> eyre::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], services.config.port));
    let app = router(services);
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
