//! `threads.pb.DataService` over the data manager.

use std::sync::Arc;

use serde_json::Value;
use tonic::{Request, Response, Status};

use super::proto::data_service_server::DataService;
use super::proto::{
    CreateReply, CreateRequest, DbInfo, DeleteReply, DeleteRequest, FindByIdReply, FindByIdRequest,
    FindReply, FindRequest, HasReply, HasRequest, ListDbsReply, ListDbsRequest, NewDbReply,
    NewDbRequest,
};
use crate::db::{self, Manager, ManagerError};

impl From<ManagerError> for Status {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::NotFound(_) => Status::not_found(err.to_string()),
            ManagerError::InvalidInstance(_) | ManagerError::InvalidName(_) => {
                Status::invalid_argument(err.to_string())
            }
            ManagerError::Store(_) | ManagerError::Encoding(_) => Status::internal(err.to_string()),
        }
    }
}

impl From<db::DbInfo> for DbInfo {
    fn from(info: db::DbInfo) -> Self {
        Self {
            id: info.id,
            name: info.name,
        }
    }
}

fn encode(instance: &Value) -> Result<Vec<u8>, Status> {
    serde_json::to_vec(instance).map_err(|e| Status::internal(e.to_string()))
}

pub struct DataApi {
    manager: Arc<Manager>,
}

impl DataApi {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager }
    }
}

#[tonic::async_trait]
impl DataService for DataApi {
    async fn new_db(&self, request: Request<NewDbRequest>) -> Result<Response<NewDbReply>, Status> {
        let info = self.manager.new_db(&request.into_inner().name).await?;
        Ok(Response::new(NewDbReply {
            db: Some(info.into()),
        }))
    }

    async fn list_dbs(&self, _request: Request<ListDbsRequest>) -> Result<Response<ListDbsReply>, Status> {
        let dbs = self.manager.list_dbs().await?;
        Ok(Response::new(ListDbsReply {
            dbs: dbs.into_iter().map(Into::into).collect(),
        }))
    }

    async fn create(&self, request: Request<CreateRequest>) -> Result<Response<CreateReply>, Status> {
        let req = request.into_inner();
        let instances = req
            .instances
            .iter()
            .map(|raw| serde_json::from_slice(raw))
            .collect::<Result<Vec<Value>, _>>()
            .map_err(|e| Status::invalid_argument(format!("instance is not JSON: {e}")))?;
        let instance_ids = self.manager.create(&req.db_id, &req.collection, instances).await?;
        Ok(Response::new(CreateReply { instance_ids }))
    }

    async fn find_by_id(&self, request: Request<FindByIdRequest>) -> Result<Response<FindByIdReply>, Status> {
        let req = request.into_inner();
        let instance = self
            .manager
            .find_by_id(&req.db_id, &req.collection, &req.instance_id)
            .await?;
        Ok(Response::new(FindByIdReply {
            instance: encode(&instance)?,
        }))
    }

    async fn has(&self, request: Request<HasRequest>) -> Result<Response<HasReply>, Status> {
        let req = request.into_inner();
        let exists = self
            .manager
            .has(&req.db_id, &req.collection, &req.instance_ids)
            .await?;
        Ok(Response::new(HasReply { exists }))
    }

    async fn delete(&self, request: Request<DeleteRequest>) -> Result<Response<DeleteReply>, Status> {
        let req = request.into_inner();
        self.manager
            .delete(&req.db_id, &req.collection, &req.instance_ids)
            .await?;
        Ok(Response::new(DeleteReply {}))
    }

    async fn find(&self, request: Request<FindRequest>) -> Result<Response<FindReply>, Status> {
        let req = request.into_inner();
        let instances = self
            .manager
            .list_instances(&req.db_id, &req.collection)
            .await?
            .iter()
            .map(encode)
            .collect::<Result<_, _>>()?;
        Ok(Response::new(FindReply { instances }))
    }
}
