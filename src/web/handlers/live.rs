use futures::{Sink, SinkExt, Stream, StreamExt, future};
use salvo::prelude::*;
use salvo::websocket::{Message, WebSocket, WebSocketUpgrade};
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::relay::TicketEvent;
use crate::web::error::render_error;
use crate::web::middleware::auth::current_principal;
use crate::web::web_state;

/// What the browser sent, as far as the feed cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Inbound {
    Close,
    Other,
}

/// Pushes ticket events to a staff browser until either side goes away.
#[handler]
pub async fn live_updates(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let state = match web_state(depot) {
        Ok(state) => state,
        Err(err) => return err.render(res),
    };
    let user_id = current_principal(depot)
        .map(|principal| principal.id.clone())
        .unwrap_or_default();

    // Subscribe before the handshake so nothing committed after it is missed.
    let events = state.relay.bus().subscribe();

    let upgraded = WebSocketUpgrade::new()
        .upgrade(req, res, move |ws| serve_socket(ws, events, user_id))
        .await;
    if let Err(err) = upgraded {
        render_error(res, err.code, &err.brief);
    }
}

async fn serve_socket(ws: WebSocket, events: broadcast::Receiver<TicketEvent>, user_id: String) {
    let (sender, receiver) = ws.split();
    let frames =
        sender.with(|text: String| future::ready(Ok::<_, salvo::Error>(Message::text(text))));
    let inbound = receiver.map(|msg| match msg {
        Ok(msg) if !msg.is_close() => Inbound::Other,
        _ => Inbound::Close,
    });
    relay_frames(frames, inbound, events, user_id).await;
}

/// Sends the `connected` greeting, then one frame per event, with a `resync`
/// frame in place of whatever a lagging subscriber missed.
pub(crate) async fn relay_frames<Tx, Rx>(
    mut frames: Tx,
    mut inbound: Rx,
    mut events: broadcast::Receiver<TicketEvent>,
    user_id: String,
) where
    Tx: Sink<String> + Unpin + Send + 'static,
    Rx: Stream<Item = Inbound> + Unpin + Send + 'static,
{
    info!("live connection opened user_id={}", user_id);
    if frames
        .send(json!({ "type": "connected" }).to_string())
        .await
        .is_err()
    {
        return;
    }

    let send_user = user_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let frame = match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("failed to encode ticket event: {}", e);
                        continue;
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "live subscriber lagged user_id={} skipped={}",
                        send_user, skipped
                    );
                    json!({ "type": "resync" }).to_string()
                }
                Err(RecvError::Closed) => break,
            };
            if frames.send(frame).await.is_err() {
                break;
            }
        }
    });

    let recv_user = user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = inbound.next().await {
            if msg == Inbound::Close {
                debug!("live close requested user_id={}", recv_user);
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    info!("live connection closed user_id={}", user_id);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use futures::channel::mpsc;
    use serde_json::{Value, json};
    use tokio::time::timeout;

    use super::{Inbound, relay_frames};
    use crate::relay::{EventBus, TicketEvent, TicketEventKind};

    fn update(ticket_id: i64) -> TicketEvent {
        TicketEvent {
            kind: TicketEventKind::TicketUpdate,
            ticket_id,
            payload: json!({ "action": "message" }),
        }
    }

    async fn next_frame(frames: &mut mpsc::UnboundedReceiver<String>) -> Value {
        let text = timeout(Duration::from_secs(5), frames.next())
            .await
            .expect("frame in time")
            .expect("feed still open");
        serde_json::from_str(&text).expect("json frame")
    }

    #[tokio::test]
    async fn greets_forwards_and_stops_on_close() {
        let bus = EventBus::new(8);
        let (frames_tx, mut frames_rx) = mpsc::unbounded();
        let (inbound_tx, inbound_rx) = mpsc::unbounded();
        let feed = tokio::spawn(relay_frames(
            frames_tx,
            inbound_rx,
            bus.subscribe(),
            "42".to_string(),
        ));

        assert_eq!(next_frame(&mut frames_rx).await, json!({ "type": "connected" }));

        bus.publish(update(5));
        let forwarded = next_frame(&mut frames_rx).await;
        assert_eq!(forwarded["type"], "ticket_update");
        assert_eq!(forwarded["ticket_id"], 5);

        inbound_tx.unbounded_send(Inbound::Other).expect("send ping");
        inbound_tx.unbounded_send(Inbound::Close).expect("send close");
        timeout(Duration::from_secs(5), feed)
            .await
            .expect("feed stops after close")
            .expect("feed task");
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_a_resync_hint() {
        let bus = EventBus::new(2);
        let events = bus.subscribe();
        for ticket_id in 1..=5 {
            bus.publish(update(ticket_id));
        }

        let (frames_tx, mut frames_rx) = mpsc::unbounded();
        let (inbound_tx, inbound_rx) = mpsc::unbounded::<Inbound>();
        let feed = tokio::spawn(relay_frames(frames_tx, inbound_rx, events, "42".to_string()));

        assert_eq!(next_frame(&mut frames_rx).await["type"], "connected");
        assert_eq!(next_frame(&mut frames_rx).await, json!({ "type": "resync" }));
        assert_eq!(next_frame(&mut frames_rx).await["ticket_id"], 4);
        assert_eq!(next_frame(&mut frames_rx).await["ticket_id"], 5);

        drop(inbound_tx);
        timeout(Duration::from_secs(5), feed)
            .await
            .expect("feed stops when the client goes away")
            .expect("feed task");
    }
}
