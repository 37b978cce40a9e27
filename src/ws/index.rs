//! WebSocket endpoint: one connection per viewer of one match.
//!
//! Inbound frames are parsed into [`ClientMsg`] and routed to the match's
//! scheduler; everything the scheduler emits for this match streams back
//! out through the hub subscription. `get_state` is answered here directly
//! so a read never waits behind the actor queue.

use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::{handle, Message};
use futures::StreamExt;
use std::sync::Arc;

use crate::game::scheduler::Schedulers;
use crate::game::snapshot::{BoardConfig, MatchSnapshot};
use crate::game::types::{MatchId, Seat};
use crate::hub::SessionHub;
use crate::protocol::{ClientMsg, ServerMsg};
use crate::store::MatchStore;

pub async fn ws_index(
    req: HttpRequest,
    body: web::Payload,
    path: web::Path<String>,
    store: web::Data<Arc<MatchStore>>,
    hub: web::Data<Arc<SessionHub>>,
    schedulers: web::Data<Arc<Schedulers>>,
) -> Result<HttpResponse, Error> {
    let match_id = MatchId::new(path.into_inner());

    // Optional seat query param; absent means spectator.
    let seat: Option<Seat> = req
        .query_string()
        .split('&')
        .find_map(|kv| kv.strip_prefix("seat="))
        .and_then(|v| v.parse::<Seat>().ok())
        .filter(|s| *s <= 1);

    let state = store
        .get(&match_id)
        .map_err(|_| actix_web::error::ErrorNotFound("unknown match"))?;

    let (response, mut session, mut ws_stream) = handle(&req, body)?;

    let (handle, mut pushes) = hub.subscribe(&match_id, seat);
    let store = store.get_ref().clone();
    let hub = hub.get_ref().clone();
    let schedulers = schedulers.get_ref().clone();

    actix::spawn(async move {
        // Greet with the board parameters and a first snapshot.
        let welcome = ServerMsg::Welcome {
            board_config: BoardConfig::of(&state),
        };
        if send_msg(&mut session, &welcome).await.is_err() {
            hub.unsubscribe(&handle);
            return;
        }
        let first = ServerMsg::State {
            state: MatchSnapshot::of(&state, seat),
        };
        if send_msg(&mut session, &first).await.is_err() {
            hub.unsubscribe(&handle);
            return;
        }

        loop {
            tokio::select! {
                // client → scheduler
                Some(frame) = ws_stream.next() => {
                    match frame {
                        Ok(Message::Text(text)) => {
                            let cmsg = match serde_json::from_str::<ClientMsg>(&text) {
                                Ok(m) => m,
                                Err(e) => {
                                    log::debug!("ignoring unparseable command: {e}");
                                    continue;
                                }
                            };
                            if let ClientMsg::GetState {} = cmsg {
                                if let Ok(current) = store.get(&match_id) {
                                    let msg = ServerMsg::State {
                                        state: MatchSnapshot::of(&current, seat),
                                    };
                                    if send_msg(&mut session, &msg).await.is_err() {
                                        break;
                                    }
                                }
                                continue;
                            }
                            if let Err(e) = schedulers.dispatch(&match_id, cmsg).await {
                                log::debug!("dispatch to {match_id} failed: {e:?}");
                            }
                        }
                        Ok(Message::Close(_)) | Err(_) => break,
                        _ => {}
                    }
                }
                // scheduler → client
                push = pushes.recv() => {
                    match push {
                        Some(msg) => {
                            if send_msg(&mut session, &msg).await.is_err() {
                                log::debug!("WS send failed for {match_id}");
                                break;
                            }
                        }
                        // Hub closed the match.
                        None => break,
                    }
                }
                else => break,
            }
        }

        hub.unsubscribe(&handle);
        log::info!("WS closed for match {match_id}");
    });

    Ok(response)
}

async fn send_msg(session: &mut actix_ws::Session, msg: &ServerMsg) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    session.text(json).await.map_err(|_| ())
}
