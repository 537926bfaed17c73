//! Protobuf messages and generated service stubs.
//!
//! Instances travel as JSON-encoded bytes.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DbInfo {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NewDbRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NewDbReply {
    #[prost(message, optional, tag = "1")]
    pub db: Option<DbInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListDbsRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListDbsReply {
    #[prost(message, repeated, tag = "1")]
    pub dbs: Vec<DbInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateRequest {
    #[prost(string, tag = "1")]
    pub db_id: String,
    #[prost(string, tag = "2")]
    pub collection: String,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub instances: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateReply {
    #[prost(string, repeated, tag = "1")]
    pub instance_ids: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FindByIdRequest {
    #[prost(string, tag = "1")]
    pub db_id: String,
    #[prost(string, tag = "2")]
    pub collection: String,
    #[prost(string, tag = "3")]
    pub instance_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FindByIdReply {
    #[prost(bytes = "vec", tag = "1")]
    pub instance: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HasRequest {
    #[prost(string, tag = "1")]
    pub db_id: String,
    #[prost(string, tag = "2")]
    pub collection: String,
    #[prost(string, repeated, tag = "3")]
    pub instance_ids: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HasReply {
    #[prost(bool, tag = "1")]
    pub exists: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteRequest {
    #[prost(string, tag = "1")]
    pub db_id: String,
    #[prost(string, tag = "2")]
    pub collection: String,
    #[prost(string, repeated, tag = "3")]
    pub instance_ids: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteReply {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FindRequest {
    #[prost(string, tag = "1")]
    pub db_id: String,
    #[prost(string, tag = "2")]
    pub collection: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FindReply {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub instances: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetHostIdRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetHostIdReply {
    #[prost(string, tag = "1")]
    pub peer_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConnectRequest {
    #[prost(string, tag = "1")]
    pub addr: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConnectReply {
    #[prost(string, tag = "1")]
    pub peer_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListPeersRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PeerInfo {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, repeated, tag = "2")]
    pub addrs: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListPeersReply {
    #[prost(message, repeated, tag = "1")]
    pub peers: Vec<PeerInfo>,
}

include!(concat!(env!("OUT_DIR"), "/threads.pb.DataService.rs"));
include!(concat!(env!("OUT_DIR"), "/threads.net.pb.NetService.rs"));
