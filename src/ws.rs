use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Serialize;
use tracing::{info, warn};

use crate::executor::{self, RunPlan};
use crate::models::dsl_model::RunRequest;
use crate::models::metrics::RunSummary;

/// Replies sent back over the control socket, one JSON object per frame.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerReply {
    Accepted { stages: usize, endpoints: usize },
    Rejected { reason: String },
    Summary { summary: Box<RunSummary> },
}

impl WorkerReply {
    fn to_text(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!("{{\"type\":\"rejected\",\"reason\":\"serialization failed: {}\"}}", e))
    }
}

/// One control connection. Runs at most one load test at a time.
#[derive(Default)]
pub struct WsSession {
    running: bool,
}

impl WsSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn start_run(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        if self.running {
            ctx.text(
                WorkerReply::Rejected {
                    reason: "a load test is already running on this connection".into(),
                }
                .to_text(),
            );
            return;
        }

        let plan = match parse_plan(text) {
            Ok(plan) => plan,
            Err(reason) => {
                warn!(%reason, "rejected run request");
                ctx.text(WorkerReply::Rejected { reason }.to_text());
                return;
            }
        };

        ctx.text(
            WorkerReply::Accepted {
                stages: plan.stages.len(),
                endpoints: crate::models::catalog::Catalog::standard().len(),
            }
            .to_text(),
        );

        self.running = true;
        let run = async move { executor::run_load_test(plan).await };
        ctx.spawn(run.into_actor(self).map(|summary, act, ctx| {
            act.running = false;
            info!(
                requests = summary.total_requests,
                failed = summary.failed_requests,
                "load test finished"
            );
            ctx.text(
                WorkerReply::Summary {
                    summary: Box::new(summary),
                }
                .to_text(),
            );
        }));
    }
}

fn parse_plan(text: &str) -> Result<RunPlan, String> {
    let request: RunRequest =
        serde_json::from_str(text).map_err(|e| format!("invalid run request: {}", e))?;
    RunPlan::from_request(request).map_err(|e| e.to_string())
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("control connection opened");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => self.start_run(&text, ctx),
            Ok(ws::Message::Ping(payload)) => ctx.pong(&payload),
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!(error = %e, "websocket protocol error");
                ctx.stop();
            }
            _ => {}
        }
    }
}

pub async fn ws_handler(req: HttpRequest, stream: web::Payload) -> Result<HttpResponse, Error> {
    ws::start(WsSession::new(), &req, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::App;
    use awc::ws::{Frame, Message};
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;

    #[test]
    fn parse_plan_reports_bad_json() {
        let err = parse_plan("{not json").unwrap_err();
        assert!(err.starts_with("invalid run request"));
    }

    #[test]
    fn parse_plan_reports_empty_stages() {
        let err = parse_plan(r#"{"stages": []}"#).unwrap_err();
        assert!(err.contains("at least one stage"));
    }

    #[test]
    fn parse_plan_accepts_minimal_request() {
        let plan = parse_plan(r#"{"params": {"base_url": "http://api", "token": "t"}}"#).unwrap();
        assert_eq!(plan.stages.len(), 2);
    }

    #[test]
    fn replies_are_tagged() {
        let text = WorkerReply::Accepted { stages: 2, endpoints: 22 }.to_text();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "accepted");
        assert_eq!(value["endpoints"], 22);

        let text = WorkerReply::Rejected { reason: "busy".into() }.to_text();
        assert!(text.contains("\"type\":\"rejected\""));
    }

    #[actix_web::test]
    async fn second_request_is_rejected_while_a_run_is_active() {
        let mut srv = actix_test::start(|| App::new().route("/ws", web::get().to(ws_handler)));
        let mut framed = srv.ws_at("/ws").await.unwrap();

        // An empty base URL fails every request immediately, keeping the run short.
        let request = r#"{
            "params": {"base_url": "", "token": "t"},
            "stages": [{"duration": "0ms", "target": 1}, {"duration": "300ms", "target": 1}],
            "timeout_ms": 100,
            "think_time_ms": 10
        }"#;
        framed.send(Message::Text(request.into())).await.unwrap();
        framed.send(Message::Text(request.into())).await.unwrap();

        let mut replies = Vec::new();
        while replies.len() < 3 {
            let frame = actix_web::rt::time::timeout(Duration::from_secs(10), framed.next())
                .await
                .expect("no reply within 10s");
            match frame {
                Some(Ok(Frame::Text(bytes))) => {
                    replies.push(serde_json::from_slice::<serde_json::Value>(&bytes).unwrap());
                }
                Some(Ok(_)) => continue,
                other => panic!("unexpected frame: {:?}", other),
            }
        }

        let kinds: Vec<_> = replies.iter().map(|r| r["type"].as_str().unwrap()).collect();
        assert_eq!(kinds, ["accepted", "rejected", "summary"]);
        assert_eq!(replies[0]["endpoints"], 22);
        assert!(replies[1]["reason"].as_str().unwrap().contains("already running"));

        let summary = &replies[2]["summary"];
        assert_eq!(summary["peak_vus"], 1);
        assert!(summary["iterations"].as_u64().unwrap() >= 1);
        assert_eq!(summary["status_2xx"], 0);
    }
}
