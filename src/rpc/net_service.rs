//! `threads.net.pb.NetService` over the network host.

use std::sync::Arc;

use libp2p::Multiaddr;
use tonic::{Request, Response, Status};

use super::proto::net_service_server::NetService;
use super::proto::{
    ConnectReply, ConnectRequest, GetHostIdReply, GetHostIdRequest, ListPeersReply,
    ListPeersRequest, PeerInfo,
};
use crate::p2p::{HostError, NetworkHost};

impl From<HostError> for Status {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Dial { .. } | HostError::Closed => Status::unavailable(err.to_string()),
            _ => Status::internal(err.to_string()),
        }
    }
}

pub struct NetApi {
    host: Arc<NetworkHost>,
}

impl NetApi {
    pub fn new(host: Arc<NetworkHost>) -> Self {
        Self { host }
    }
}

#[tonic::async_trait]
impl NetService for NetApi {
    async fn get_host_id(&self, _request: Request<GetHostIdRequest>) -> Result<Response<GetHostIdReply>, Status> {
        Ok(Response::new(GetHostIdReply {
            peer_id: self.host.peer_id().to_string(),
        }))
    }

    async fn connect(&self, request: Request<ConnectRequest>) -> Result<Response<ConnectReply>, Status> {
        let raw = request.into_inner().addr;
        let addr: Multiaddr = raw
            .parse()
            .map_err(|e| Status::invalid_argument(format!("invalid multiaddr {raw:?}: {e}")))?;
        let peer_id = self.host.connect(addr).await?;
        Ok(Response::new(ConnectReply {
            peer_id: peer_id.to_string(),
        }))
    }

    async fn list_peers(&self, _request: Request<ListPeersRequest>) -> Result<Response<ListPeersReply>, Status> {
        let peers = self
            .host
            .peers()
            .await?
            .into_iter()
            .map(|peer| PeerInfo {
                id: peer.id.to_string(),
                addrs: peer.addrs.iter().map(ToString::to_string).collect(),
            })
            .collect();
        Ok(Response::new(ListPeersReply { peers }))
    }
}
