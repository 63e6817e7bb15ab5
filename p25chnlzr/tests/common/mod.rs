#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use p25chnlzr::{Capabilities, ChannelRequest, ChannelState, ChnlzrCodec, Message};
use p25model::{HostId, RfAttributes};
use std::future::Future;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

pub type HostSide = Framed<TcpStream, ChnlzrCodec>;

pub fn capabilities() -> Capabilities {
    Capabilities {
        latitude: 10.0,
        longitude: 20.0,
        polarization: 0,
        min_frequency: 30.0,
        max_frequency: 40.0,
        max_channel_rate: 50,
    }
}

pub fn state() -> ChannelState {
    ChannelState {
        sample_rate: 48_000,
        center_frequency: 851_012_500.0,
    }
}

pub fn request() -> ChannelRequest {
    ChannelRequest::p25(&RfAttributes::new(45.1, 5.7, 0, 851_012_500.0), 2_000)
}

/// Accepts one connection and runs `script` on it.
pub async fn fake_chnlzr<F, Fut, T>(script: F) -> (HostId, JoinHandle<T>)
where
    F: FnOnce(HostSide) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        script(Framed::new(stream, ChnlzrCodec)).await
    });
    (HostId::new("127.0.0.1", port), handle)
}

/// A port nobody listens on.
pub async fn refused_host() -> HostId {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    HostId::new("127.0.0.1", port)
}

/// Happy path of a capabilities-first host, then waits for the client to hang up.
pub async fn grant(mut host: HostSide) -> Option<ChannelRequest> {
    host.send(Message::Capabilities(capabilities())).await.unwrap();
    let request = match host.next().await {
        Some(Ok(Message::ChannelRequest(request))) => Some(request),
        _ => None,
    };
    host.send(Message::ChannelState(state())).await.unwrap();
    while let Some(Ok(_)) = host.next().await {}
    request
}
