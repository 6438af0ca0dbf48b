// ---- Common ----

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoBranchId {
    #[prost(uint64, tag = "1")]
    pub hi: u64,
    #[prost(uint64, tag = "2")]
    pub lo: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRegion {
    #[prost(uint64, tag = "1")]
    pub hash_beg: u64,
    #[prost(uint64, tag = "2")]
    pub hash_end: u64,
    #[prost(bytes = "vec", tag = "3")]
    pub left: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub right: ::prost::alloc::vec::Vec<u8>,
    /// An unbounded region has no right key.
    #[prost(bool, tag = "5")]
    pub has_right: bool,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoEmpty {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoServerFault {
    #[prost(string, tag = "1")]
    pub message: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoLostContact {
    #[prost(string, tag = "1")]
    pub message: ::prost::alloc::string::String,
}
// ---- GrpcReplicator ----

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRegisterReq {
    #[prost(message, optional, tag = "1")]
    pub branch: ::core::option::Option<ProtoBranchId>,
    #[prost(string, tag = "2")]
    pub server_id: ::prost::alloc::string::String,
    /// Where the primary reaches the secondary's GrpcReplica service.
    #[prost(string, tag = "3")]
    pub replica_url: ::prost::alloc::string::String,
    /// Identifies the listener within that service.
    #[prost(uint64, tag = "4")]
    pub route_id: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRegisterResult {
    #[prost(oneof = "proto_register_result::Result", tags = "1, 2")]
    pub result: ::core::option::Option<proto_register_result::Result>,
}
/// Nested message and enum types in `ProtoRegisterResult`.
pub mod proto_register_result {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "1")]
        Ok(super::ProtoRegisterSuccess),
        #[prost(message, tag = "2")]
        Err(super::ProtoEndpointError),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRegisterSuccess {
    #[prost(uint64, tag = "1")]
    pub registration_id: u64,
    #[prost(uint64, tag = "2")]
    pub initial_timestamp: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRegistrationReq {
    #[prost(message, optional, tag = "1")]
    pub branch: ::core::option::Option<ProtoBranchId>,
    #[prost(uint64, tag = "2")]
    pub registration_id: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRegistrationResult {
    #[prost(oneof = "proto_registration_result::Result", tags = "1, 2")]
    pub result: ::core::option::Option<proto_registration_result::Result>,
}
/// Nested message and enum types in `ProtoRegistrationResult`.
pub mod proto_registration_result {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "1")]
        Ok(super::ProtoEmpty),
        #[prost(message, tag = "2")]
        Err(super::ProtoEndpointError),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoBackfillChunkReq {
    #[prost(message, optional, tag = "1")]
    pub branch: ::core::option::Option<ProtoBranchId>,
    #[prost(message, optional, tag = "2")]
    pub region: ::core::option::Option<ProtoRegion>,
    #[prost(bytes = "vec", tag = "3")]
    pub after: ::prost::alloc::vec::Vec<u8>,
    #[prost(bool, tag = "4")]
    pub has_after: bool,
    #[prost(uint64, tag = "5")]
    pub min_timestamp: u64,
    #[prost(uint64, tag = "6")]
    pub limit: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoBackfillChunkResult {
    #[prost(oneof = "proto_backfill_chunk_result::Result", tags = "1, 2")]
    pub result: ::core::option::Option<proto_backfill_chunk_result::Result>,
}
/// Nested message and enum types in `ProtoBackfillChunkResult`.
pub mod proto_backfill_chunk_result {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "1")]
        Ok(super::ProtoBackfillChunk),
        #[prost(message, tag = "2")]
        Err(super::ProtoEndpointError),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoBackfillChunk {
    #[prost(bytes = "vec", tag = "1")]
    pub after: ::prost::alloc::vec::Vec<u8>,
    #[prost(bool, tag = "2")]
    pub has_after: bool,
    #[prost(message, repeated, tag = "3")]
    pub items: ::prost::alloc::vec::Vec<ProtoKeyValue>,
    #[prost(bytes = "vec", tag = "4")]
    pub last_key: ::prost::alloc::vec::Vec<u8>,
    #[prost(bool, tag = "5")]
    pub has_last_key: bool,
    #[prost(bool, tag = "6")]
    pub done: bool,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoKeyValue {
    #[prost(bytes = "vec", tag = "1")]
    pub key: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoEndpointError {
    #[prost(oneof = "proto_endpoint_error::Err", tags = "1, 2, 3, 4, 5")]
    pub err: ::core::option::Option<proto_endpoint_error::Err>,
}
/// Nested message and enum types in `ProtoEndpointError`.
pub mod proto_endpoint_error {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Err {
        #[prost(message, tag = "1")]
        LostContact(super::ProtoLostContact),
        #[prost(message, tag = "2")]
        NotRegistered(super::ProtoNotRegistered),
        #[prost(message, tag = "3")]
        WrongRegion(super::ProtoWrongRegion),
        #[prost(message, tag = "4")]
        Interrupted(super::ProtoEmpty),
        #[prost(message, tag = "5")]
        ServerFault(super::ProtoServerFault),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoNotRegistered {
    #[prost(uint64, tag = "1")]
    pub registration_id: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoWrongRegion {
    #[prost(message, optional, tag = "1")]
    pub region: ::core::option::Option<ProtoRegion>,
}
// ---- GrpcReplica ----

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoDoReadReq {
    #[prost(uint64, tag = "1")]
    pub route_id: u64,
    #[prost(message, optional, tag = "2")]
    pub read: ::core::option::Option<ProtoRead>,
    #[prost(uint64, tag = "3")]
    pub min_timestamp: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRead {
    #[prost(oneof = "proto_read::Read", tags = "1")]
    pub read: ::core::option::Option<proto_read::Read>,
}
/// Nested message and enum types in `ProtoRead`.
pub mod proto_read {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Read {
        #[prost(message, tag = "1")]
        Get(super::ProtoGet),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoGet {
    #[prost(bytes = "vec", tag = "1")]
    pub key: ::prost::alloc::vec::Vec<u8>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoDoReadResult {
    #[prost(oneof = "proto_do_read_result::Result", tags = "1, 2")]
    pub result: ::core::option::Option<proto_do_read_result::Result>,
}
/// Nested message and enum types in `ProtoDoReadResult`.
pub mod proto_do_read_result {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "1")]
        Ok(super::ProtoReadResponse),
        #[prost(message, tag = "2")]
        Err(super::ProtoDispatcheeError),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoReadResponse {
    #[prost(oneof = "proto_read_response::Response", tags = "1")]
    pub response: ::core::option::Option<proto_read_response::Response>,
}
/// Nested message and enum types in `ProtoReadResponse`.
pub mod proto_read_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Response {
        #[prost(message, tag = "1")]
        Get(super::ProtoGetResponse),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoGetResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub value: ::prost::alloc::vec::Vec<u8>,
    #[prost(bool, tag = "2")]
    pub found: bool,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoDoWriteReq {
    #[prost(uint64, tag = "1")]
    pub route_id: u64,
    #[prost(message, optional, tag = "2")]
    pub write: ::core::option::Option<ProtoWrite>,
    #[prost(uint64, tag = "3")]
    pub timestamp: u64,
    #[prost(uint64, tag = "4")]
    pub order_source: u64,
    #[prost(uint64, tag = "5")]
    pub order_seq: u64,
    /// Readable replicas apply synchronously and answer with a response.
    #[prost(bool, tag = "6")]
    pub sync: bool,
    /// Only meaningful for sync writes.
    #[prost(bool, tag = "7")]
    pub hard: bool,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoWrite {
    #[prost(oneof = "proto_write::Write", tags = "1, 2, 3")]
    pub write: ::core::option::Option<proto_write::Write>,
}
/// Nested message and enum types in `ProtoWrite`.
pub mod proto_write {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Write {
        #[prost(message, tag = "1")]
        Put(super::ProtoPut),
        #[prost(message, tag = "2")]
        Delete(super::ProtoDelete),
        #[prost(message, tag = "3")]
        Sync(super::ProtoEmpty),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoPut {
    #[prost(bytes = "vec", tag = "1")]
    pub key: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoDelete {
    #[prost(bytes = "vec", tag = "1")]
    pub key: ::prost::alloc::vec::Vec<u8>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoDoWriteResult {
    #[prost(oneof = "proto_do_write_result::Result", tags = "1, 2")]
    pub result: ::core::option::Option<proto_do_write_result::Result>,
}
/// Nested message and enum types in `ProtoDoWriteResult`.
pub mod proto_do_write_result {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "1")]
        Ok(super::ProtoWriteResponse),
        #[prost(message, tag = "2")]
        Err(super::ProtoDispatcheeError),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoWriteResponse {
    #[prost(oneof = "proto_write_response::Response", tags = "1, 2, 3, 4")]
    pub response: ::core::option::Option<proto_write_response::Response>,
}
/// Nested message and enum types in `ProtoWriteResponse`.
pub mod proto_write_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Response {
        #[prost(message, tag = "1")]
        Stored(super::ProtoStored),
        #[prost(message, tag = "2")]
        Deleted(super::ProtoDeleted),
        #[prost(message, tag = "3")]
        Synced(super::ProtoEmpty),
        /// Acknowledges an async write.
        #[prost(message, tag = "4")]
        Applied(super::ProtoEmpty),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoStored {
    #[prost(bool, tag = "1")]
    pub replaced: bool,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoDeleted {
    #[prost(bool, tag = "1")]
    pub existed: bool,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoDispatcheeError {
    #[prost(oneof = "proto_dispatchee_error::Err", tags = "1, 2, 3, 4")]
    pub err: ::core::option::Option<proto_dispatchee_error::Err>,
}
/// Nested message and enum types in `ProtoDispatcheeError`.
pub mod proto_dispatchee_error {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Err {
        #[prost(message, tag = "1")]
        LostContact(super::ProtoLostContact),
        #[prost(message, tag = "2")]
        Interrupted(super::ProtoEmpty),
        #[prost(message, tag = "3")]
        NotStreaming(super::ProtoEmpty),
        #[prost(message, tag = "4")]
        ServerFault(super::ProtoServerFault),
    }
}
#[doc = r" Generated client implementations."]
pub mod grpc_replicator_client {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    #[doc = " Served by primaries. Secondaries subscribe to writes and copy existing data through it."]
    pub struct GrpcReplicatorClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl GrpcReplicatorClient<tonic::transport::Channel> {
        #[doc = r" Attempt to create a new client by connecting to a given endpoint."]
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: std::convert::TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> GrpcReplicatorClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::ResponseBody: Body + HttpBody + Send + 'static,
        T::Error: Into<StdError>,
        <T::ResponseBody as HttpBody>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = tonic::client::Grpc::with_interceptor(inner, interceptor);
            Self { inner }
        }
        pub async fn register(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoRegisterReq>,
        ) -> Result<tonic::Response<super::ProtoRegisterResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/replication.GrpcReplicator/Register");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn mark_ready(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoRegistrationReq>,
        ) -> Result<tonic::Response<super::ProtoRegistrationResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/replication.GrpcReplicator/MarkReady");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn deregister(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoRegistrationReq>,
        ) -> Result<tonic::Response<super::ProtoRegistrationResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/replication.GrpcReplicator/Deregister");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn check_registration(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoRegistrationReq>,
        ) -> Result<tonic::Response<super::ProtoRegistrationResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/replication.GrpcReplicator/CheckRegistration",
            );
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn backfill_chunk(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoBackfillChunkReq>,
        ) -> Result<tonic::Response<super::ProtoBackfillChunkResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/replication.GrpcReplicator/BackfillChunk");
            self.inner.unary(request.into_request(), path, codec).await
        }
    }
    impl<T: Clone> Clone for GrpcReplicatorClient<T> {
        fn clone(&self) -> Self {
            Self {
                inner: self.inner.clone(),
            }
        }
    }
    impl<T> std::fmt::Debug for GrpcReplicatorClient<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "GrpcReplicatorClient {{ ... }}")
        }
    }
}
#[doc = r" Generated client implementations."]
pub mod grpc_replica_client {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    #[doc = " Served by secondaries. Primaries deliver reads and writes to registered listeners through it."]
    pub struct GrpcReplicaClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl GrpcReplicaClient<tonic::transport::Channel> {
        #[doc = r" Attempt to create a new client by connecting to a given endpoint."]
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: std::convert::TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> GrpcReplicaClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::ResponseBody: Body + HttpBody + Send + 'static,
        T::Error: Into<StdError>,
        <T::ResponseBody as HttpBody>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = tonic::client::Grpc::with_interceptor(inner, interceptor);
            Self { inner }
        }
        pub async fn do_read(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoDoReadReq>,
        ) -> Result<tonic::Response<super::ProtoDoReadResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/replication.GrpcReplica/DoRead");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn do_write(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoDoWriteReq>,
        ) -> Result<tonic::Response<super::ProtoDoWriteResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/replication.GrpcReplica/DoWrite");
            self.inner.unary(request.into_request(), path, codec).await
        }
    }
    impl<T: Clone> Clone for GrpcReplicaClient<T> {
        fn clone(&self) -> Self {
            Self {
                inner: self.inner.clone(),
            }
        }
    }
    impl<T> std::fmt::Debug for GrpcReplicaClient<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "GrpcReplicaClient {{ ... }}")
        }
    }
}
#[doc = r" Generated server implementations."]
pub mod grpc_replicator_server {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    #[doc = "Generated trait containing gRPC methods that should be implemented for use with GrpcReplicatorServer."]
    #[async_trait]
    pub trait GrpcReplicator: Send + Sync + 'static {
        async fn register(
            &self,
            request: tonic::Request<super::ProtoRegisterReq>,
        ) -> Result<tonic::Response<super::ProtoRegisterResult>, tonic::Status>;
        async fn mark_ready(
            &self,
            request: tonic::Request<super::ProtoRegistrationReq>,
        ) -> Result<tonic::Response<super::ProtoRegistrationResult>, tonic::Status>;
        async fn deregister(
            &self,
            request: tonic::Request<super::ProtoRegistrationReq>,
        ) -> Result<tonic::Response<super::ProtoRegistrationResult>, tonic::Status>;
        async fn check_registration(
            &self,
            request: tonic::Request<super::ProtoRegistrationReq>,
        ) -> Result<tonic::Response<super::ProtoRegistrationResult>, tonic::Status>;
        async fn backfill_chunk(
            &self,
            request: tonic::Request<super::ProtoBackfillChunkReq>,
        ) -> Result<tonic::Response<super::ProtoBackfillChunkResult>, tonic::Status>;
    }
    #[doc = " Served by primaries. Secondaries subscribe to writes and copy existing data through it."]
    #[derive(Debug)]
    pub struct GrpcReplicatorServer<T: GrpcReplicator> {
        inner: _Inner<T>,
    }
    struct _Inner<T>(Arc<T>, Option<tonic::Interceptor>);
    impl<T: GrpcReplicator> GrpcReplicatorServer<T> {
        pub fn new(inner: T) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, None);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, Some(interceptor.into()));
            Self { inner }
        }
    }
    impl<T, B> Service<http::Request<B>> for GrpcReplicatorServer<T>
    where
        T: GrpcReplicator,
        B: HttpBody + Send + Sync + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = Never;
        type Future = BoxFuture<Self::Response, Self::Error>;
        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();
            match req.uri().path() {
                "/replication.GrpcReplicator/Register" => {
                    #[allow(non_camel_case_types)]
                    struct RegisterSvc<T: GrpcReplicator>(pub Arc<T>);
                    impl<T: GrpcReplicator> tonic::server::UnaryService<super::ProtoRegisterReq> for RegisterSvc<T> {
                        type Response = super::ProtoRegisterResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoRegisterReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).register(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = RegisterSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/replication.GrpcReplicator/MarkReady" => {
                    #[allow(non_camel_case_types)]
                    struct MarkReadySvc<T: GrpcReplicator>(pub Arc<T>);
                    impl<T: GrpcReplicator> tonic::server::UnaryService<super::ProtoRegistrationReq>
                        for MarkReadySvc<T>
                    {
                        type Response = super::ProtoRegistrationResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoRegistrationReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).mark_ready(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = MarkReadySvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/replication.GrpcReplicator/Deregister" => {
                    #[allow(non_camel_case_types)]
                    struct DeregisterSvc<T: GrpcReplicator>(pub Arc<T>);
                    impl<T: GrpcReplicator> tonic::server::UnaryService<super::ProtoRegistrationReq>
                        for DeregisterSvc<T>
                    {
                        type Response = super::ProtoRegistrationResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoRegistrationReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).deregister(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = DeregisterSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/replication.GrpcReplicator/CheckRegistration" => {
                    #[allow(non_camel_case_types)]
                    struct CheckRegistrationSvc<T: GrpcReplicator>(pub Arc<T>);
                    impl<T: GrpcReplicator> tonic::server::UnaryService<super::ProtoRegistrationReq>
                        for CheckRegistrationSvc<T>
                    {
                        type Response = super::ProtoRegistrationResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoRegistrationReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).check_registration(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = CheckRegistrationSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/replication.GrpcReplicator/BackfillChunk" => {
                    #[allow(non_camel_case_types)]
                    struct BackfillChunkSvc<T: GrpcReplicator>(pub Arc<T>);
                    impl<T: GrpcReplicator>
                        tonic::server::UnaryService<super::ProtoBackfillChunkReq>
                        for BackfillChunkSvc<T>
                    {
                        type Response = super::ProtoBackfillChunkResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoBackfillChunkReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).backfill_chunk(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = BackfillChunkSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", "12")
                        .header("content-type", "application/grpc")
                        .body(tonic::body::BoxBody::empty())
                        .unwrap())
                }),
            }
        }
    }
    impl<T: GrpcReplicator> Clone for GrpcReplicatorServer<T> {
        fn clone(&self) -> Self {
            let inner = self.inner.clone();
            Self { inner }
        }
    }
    impl<T: GrpcReplicator> Clone for _Inner<T> {
        fn clone(&self) -> Self {
            Self(self.0.clone(), self.1.clone())
        }
    }
    impl<T: std::fmt::Debug> std::fmt::Debug for _Inner<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }
    impl<T: GrpcReplicator> tonic::transport::NamedService for GrpcReplicatorServer<T> {
        const NAME: &'static str = "replication.GrpcReplicator";
    }
}
#[doc = r" Generated server implementations."]
pub mod grpc_replica_server {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    #[doc = "Generated trait containing gRPC methods that should be implemented for use with GrpcReplicaServer."]
    #[async_trait]
    pub trait GrpcReplica: Send + Sync + 'static {
        async fn do_read(
            &self,
            request: tonic::Request<super::ProtoDoReadReq>,
        ) -> Result<tonic::Response<super::ProtoDoReadResult>, tonic::Status>;
        async fn do_write(
            &self,
            request: tonic::Request<super::ProtoDoWriteReq>,
        ) -> Result<tonic::Response<super::ProtoDoWriteResult>, tonic::Status>;
    }
    #[doc = " Served by secondaries. Primaries deliver reads and writes to registered listeners through it."]
    #[derive(Debug)]
    pub struct GrpcReplicaServer<T: GrpcReplica> {
        inner: _Inner<T>,
    }
    struct _Inner<T>(Arc<T>, Option<tonic::Interceptor>);
    impl<T: GrpcReplica> GrpcReplicaServer<T> {
        pub fn new(inner: T) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, None);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, Some(interceptor.into()));
            Self { inner }
        }
    }
    impl<T, B> Service<http::Request<B>> for GrpcReplicaServer<T>
    where
        T: GrpcReplica,
        B: HttpBody + Send + Sync + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = Never;
        type Future = BoxFuture<Self::Response, Self::Error>;
        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();
            match req.uri().path() {
                "/replication.GrpcReplica/DoRead" => {
                    #[allow(non_camel_case_types)]
                    struct DoReadSvc<T: GrpcReplica>(pub Arc<T>);
                    impl<T: GrpcReplica> tonic::server::UnaryService<super::ProtoDoReadReq> for DoReadSvc<T> {
                        type Response = super::ProtoDoReadResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoDoReadReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).do_read(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = DoReadSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/replication.GrpcReplica/DoWrite" => {
                    #[allow(non_camel_case_types)]
                    struct DoWriteSvc<T: GrpcReplica>(pub Arc<T>);
                    impl<T: GrpcReplica> tonic::server::UnaryService<super::ProtoDoWriteReq> for DoWriteSvc<T> {
                        type Response = super::ProtoDoWriteResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoDoWriteReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).do_write(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = DoWriteSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", "12")
                        .header("content-type", "application/grpc")
                        .body(tonic::body::BoxBody::empty())
                        .unwrap())
                }),
            }
        }
    }
    impl<T: GrpcReplica> Clone for GrpcReplicaServer<T> {
        fn clone(&self) -> Self {
            let inner = self.inner.clone();
            Self { inner }
        }
    }
    impl<T: GrpcReplica> Clone for _Inner<T> {
        fn clone(&self) -> Self {
            Self(self.0.clone(), self.1.clone())
        }
    }
    impl<T: std::fmt::Debug> std::fmt::Debug for _Inner<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }
    impl<T: GrpcReplica> tonic::transport::NamedService for GrpcReplicaServer<T> {
        const NAME: &'static str = "replication.GrpcReplica";
    }
}
