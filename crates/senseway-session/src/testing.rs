//! Simulated sensor nodes on a [`MockLink`], for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use senseway_frame::{decode_frame, encode_frame, Frame, BROADCAST_ID, DEFAULT_MAX_PAYLOAD};
use senseway_transport::MockLink;

type Handler = Box<dyn FnMut(&Frame) -> Vec<Frame> + Send>;

#[derive(Default)]
struct BusState {
    handlers: HashMap<(u8, u8), Handler>,
    requests: Vec<Frame>,
    pending: BytesMut,
}

/// A set of simulated nodes answering requests written to a mock link.
///
/// Requests are decoded with the reference codec and dispatched by
/// `(receiver id, message id)`. Broadcast requests reach every node with a
/// handler for the message.
#[derive(Clone)]
pub(crate) struct SimulatedBus {
    link: MockLink,
    state: Arc<Mutex<BusState>>,
}

impl SimulatedBus {
    pub(crate) fn new() -> Self {
        Self::on_link(MockLink::new())
    }

    pub(crate) fn on_link(link: MockLink) -> Self {
        let state = Arc::new(Mutex::new(BusState::default()));
        let dispatch = Arc::clone(&state);
        link.set_responder(move |bytes| {
            let mut state = dispatch.lock().unwrap();
            state.pending.extend_from_slice(bytes);
            let mut out = BytesMut::new();
            while let Ok(Some(request)) = decode_frame(&mut state.pending, DEFAULT_MAX_PAYLOAD) {
                state.requests.push(request.clone());
                for reply in state.dispatch(&request) {
                    encode_frame(&reply, &mut out).unwrap();
                }
            }
            out.to_vec()
        });
        Self { link, state }
    }

    pub(crate) fn link(&self) -> MockLink {
        self.link.clone()
    }

    pub(crate) fn node(&self, id: u8) -> SimulatedNode<'_> {
        SimulatedNode { bus: self, id }
    }

    /// Every request decoded so far.
    pub(crate) fn requests(&self) -> Vec<Frame> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests carrying `message_id`.
    pub(crate) fn requests_for(&self, message_id: impl Into<u8>) -> Vec<Frame> {
        let message_id = message_id.into();
        self.requests()
            .into_iter()
            .filter(|frame| frame.message_id == message_id)
            .collect()
    }
}

impl BusState {
    fn dispatch(&mut self, request: &Frame) -> Vec<Frame> {
        if request.receiver_id == BROADCAST_ID {
            let mut ids: Vec<u8> = self
                .handlers
                .keys()
                .filter(|(_, message)| *message == request.message_id)
                .map(|(node, _)| *node)
                .collect();
            ids.sort_unstable();
            return ids
                .into_iter()
                .flat_map(|id| self.call(id, request))
                .collect();
        }
        self.call(request.receiver_id, request)
    }

    fn call(&mut self, node: u8, request: &Frame) -> Vec<Frame> {
        self.handlers
            .get_mut(&(node, request.message_id))
            .map(|handler| handler(request))
            .unwrap_or_default()
    }
}

pub(crate) struct SimulatedNode<'a> {
    bus: &'a SimulatedBus,
    id: u8,
}

impl SimulatedNode<'_> {
    /// Answer `message_id` with a payload, echoing the message id back to
    /// the requester. Returning `None` stays silent.
    pub(crate) fn on<F>(&self, message_id: impl Into<u8>, mut handler: F) -> &Self
    where
        F: FnMut(&Frame) -> Option<Vec<u8>> + Send + 'static,
    {
        let id = self.id;
        self.on_frames(message_id, move |request| {
            handler(request)
                .map(|payload| {
                    vec![Frame::new(
                        id,
                        request.transmitter_id,
                        request.message_id,
                        payload,
                    )]
                })
                .unwrap_or_default()
        })
    }

    /// Answer `message_id` with arbitrary frames.
    pub(crate) fn on_frames<F>(&self, message_id: impl Into<u8>, handler: F) -> &Self
    where
        F: FnMut(&Frame) -> Vec<Frame> + Send + 'static,
    {
        self.bus
            .state
            .lock()
            .unwrap()
            .handlers
            .insert((self.id, message_id.into()), Box::new(handler));
        self
    }
}

/// Wire bytes of a single frame.
pub(crate) fn reply(from: u8, to: u8, message_id: impl Into<u8>, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(&Frame::new(from, to, message_id, payload.to_vec()), &mut buf).unwrap();
    buf.to_vec()
}
