use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic_prost::ProstCodec";

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::rpc::proto::{input}"))
        .output_type(format!("crate::rpc::proto::{output}"))
        .codec_path(CODEC)
        .build()
}

fn main() {
    let data_service = Service::builder()
        .name("DataService")
        .package("threads.pb")
        .method(unary("new_db", "NewDb", "NewDbRequest", "NewDbReply"))
        .method(unary("list_dbs", "ListDbs", "ListDbsRequest", "ListDbsReply"))
        .method(unary("create", "Create", "CreateRequest", "CreateReply"))
        .method(unary("find_by_id", "FindById", "FindByIdRequest", "FindByIdReply"))
        .method(unary("has", "Has", "HasRequest", "HasReply"))
        .method(unary("delete", "Delete", "DeleteRequest", "DeleteReply"))
        .method(unary("find", "Find", "FindRequest", "FindReply"))
        .build();

    let net_service = Service::builder()
        .name("NetService")
        .package("threads.net.pb")
        .method(unary("get_host_id", "GetHostId", "GetHostIdRequest", "GetHostIdReply"))
        .method(unary("connect", "Connect", "ConnectRequest", "ConnectReply"))
        .method(unary("list_peers", "ListPeers", "ListPeersRequest", "ListPeersReply"))
        .build();

    Builder::new().compile(&[data_service, net_service]);
}
