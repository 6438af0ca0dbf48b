use crate::dispatcher::{DispatcheeError, RegistrationId};
use crate::grpc::{
    proto_dispatchee_error, proto_endpoint_error, proto_read, proto_read_response, proto_write, proto_write_response,
    ProtoBackfillChunk, ProtoBranchId, ProtoDeleted, ProtoDispatcheeError, ProtoEmpty, ProtoEndpointError, ProtoGet,
    ProtoGetResponse, ProtoKeyValue, ProtoLostContact, ProtoNotRegistered, ProtoPut, ProtoRead, ProtoReadResponse,
    ProtoRegion, ProtoServerFault, ProtoStored, ProtoWrite, ProtoWriteResponse, ProtoWrongRegion, ProtoDelete,
};
use crate::query::{Read, ReadResponse, Write, WriteResponse};
use crate::region::{HashRange, Key, KeyRange, Region, HASH_SPACE};
use crate::replicator::EndpointError;
use crate::store::BackfillChunk;
use crate::version::BranchId;
use bytes::Bytes;
use tonic::Status;

pub(crate) fn branch_to_proto(branch: BranchId) -> ProtoBranchId {
    let id = branch.as_u128();
    ProtoBranchId {
        hi: (id >> 64) as u64,
        lo: id as u64,
    }
}

pub(crate) fn branch_from_proto(branch: Option<ProtoBranchId>) -> Result<BranchId, Status> {
    let branch = branch.ok_or_else(|| Status::invalid_argument("Missing branch"))?;
    Ok(BranchId::from_u128(((branch.hi as u128) << 64) | branch.lo as u128))
}

pub(crate) fn region_to_proto(region: &Region) -> ProtoRegion {
    ProtoRegion {
        hash_beg: region.hash.beg,
        hash_end: region.hash.end,
        left: region.keys.left.as_bytes().to_vec(),
        right: region
            .keys
            .right
            .as_ref()
            .map(|right| right.as_bytes().to_vec())
            .unwrap_or_default(),
        has_right: region.keys.right.is_some(),
    }
}

pub(crate) fn region_from_proto(region: Option<ProtoRegion>) -> Result<Region, Status> {
    let region = region.ok_or_else(|| Status::invalid_argument("Missing region"))?;
    if region.hash_beg > region.hash_end || region.hash_end > HASH_SPACE {
        return Err(Status::invalid_argument("Hash range is outside of the hash space"));
    }

    let right = if region.has_right {
        Some(Key::new(region.right))
    } else {
        None
    };

    Ok(Region::new(
        HashRange::new(region.hash_beg, region.hash_end),
        KeyRange::new(Key::new(region.left), right),
    ))
}

pub(crate) fn optional_key_to_proto(key: &Option<Key>) -> (Vec<u8>, bool) {
    match key {
        Some(key) => (key.as_bytes().to_vec(), true),
        None => (Vec::new(), false),
    }
}

pub(crate) fn optional_key_from_proto(key: Vec<u8>, present: bool) -> Option<Key> {
    if present {
        Some(Key::new(key))
    } else {
        None
    }
}

pub(crate) fn chunk_to_proto(chunk: BackfillChunk) -> ProtoBackfillChunk {
    let (after, has_after) = optional_key_to_proto(&chunk.after);
    let (last_key, has_last_key) = optional_key_to_proto(&chunk.last_key);

    ProtoBackfillChunk {
        after,
        has_after,
        items: chunk
            .items
            .into_iter()
            .map(|(key, value)| ProtoKeyValue {
                key: key.into_bytes().to_vec(),
                value: value.to_vec(),
            })
            .collect(),
        last_key,
        has_last_key,
        done: chunk.done,
    }
}

pub(crate) fn chunk_from_proto(chunk: ProtoBackfillChunk) -> BackfillChunk {
    BackfillChunk {
        after: optional_key_from_proto(chunk.after, chunk.has_after),
        items: chunk
            .items
            .into_iter()
            .map(|item| (Key::new(item.key), Bytes::from(item.value)))
            .collect(),
        last_key: optional_key_from_proto(chunk.last_key, chunk.has_last_key),
        done: chunk.done,
    }
}

pub(crate) fn read_to_proto(read: &Read) -> ProtoRead {
    match read {
        Read::Get { key } => ProtoRead {
            read: Some(proto_read::Read::Get(ProtoGet {
                key: key.as_bytes().to_vec(),
            })),
        },
    }
}

pub(crate) fn read_from_proto(read: Option<ProtoRead>) -> Result<Read, Status> {
    match read.and_then(|r| r.read) {
        Some(proto_read::Read::Get(get)) => Ok(Read::Get { key: Key::new(get.key) }),
        None => Err(Status::invalid_argument("Missing read")),
    }
}

pub(crate) fn read_response_to_proto(response: ReadResponse) -> ProtoReadResponse {
    match response {
        ReadResponse::Get { value } => ProtoReadResponse {
            response: Some(proto_read_response::Response::Get(ProtoGetResponse {
                found: value.is_some(),
                value: value.map(|v| v.to_vec()).unwrap_or_default(),
            })),
        },
    }
}

pub(crate) fn read_response_from_proto(response: ProtoReadResponse) -> Result<ReadResponse, DispatcheeError> {
    match response.response {
        Some(proto_read_response::Response::Get(get)) => Ok(ReadResponse::Get {
            value: if get.found { Some(Bytes::from(get.value)) } else { None },
        }),
        None => Err(DispatcheeError::LostContact("Replica sent an empty read response".to_string())),
    }
}

pub(crate) fn write_to_proto(write: &Write) -> ProtoWrite {
    let write = match write {
        Write::Put { key, value } => proto_write::Write::Put(ProtoPut {
            key: key.as_bytes().to_vec(),
            value: value.to_vec(),
        }),
        Write::Delete { key } => proto_write::Write::Delete(ProtoDelete {
            key: key.as_bytes().to_vec(),
        }),
        Write::Sync => proto_write::Write::Sync(ProtoEmpty {}),
    };

    ProtoWrite { write: Some(write) }
}

pub(crate) fn write_from_proto(write: Option<ProtoWrite>) -> Result<Write, Status> {
    match write.and_then(|w| w.write) {
        Some(proto_write::Write::Put(put)) => Ok(Write::Put {
            key: Key::new(put.key),
            value: Bytes::from(put.value),
        }),
        Some(proto_write::Write::Delete(delete)) => Ok(Write::Delete {
            key: Key::new(delete.key),
        }),
        Some(proto_write::Write::Sync(_)) => Ok(Write::Sync),
        None => Err(Status::invalid_argument("Missing write")),
    }
}

pub(crate) fn write_response_to_proto(response: Option<WriteResponse>) -> ProtoWriteResponse {
    let response = match response {
        None => proto_write_response::Response::Applied(ProtoEmpty {}),
        Some(WriteResponse::Stored { replaced }) => proto_write_response::Response::Stored(ProtoStored { replaced }),
        Some(WriteResponse::Deleted { existed }) => proto_write_response::Response::Deleted(ProtoDeleted { existed }),
        Some(WriteResponse::Synced) => proto_write_response::Response::Synced(ProtoEmpty {}),
    };

    ProtoWriteResponse {
        response: Some(response),
    }
}

pub(crate) fn write_response_from_proto(response: ProtoWriteResponse) -> Result<Option<WriteResponse>, DispatcheeError> {
    match response.response {
        Some(proto_write_response::Response::Applied(_)) => Ok(None),
        Some(proto_write_response::Response::Stored(stored)) => Ok(Some(WriteResponse::Stored {
            replaced: stored.replaced,
        })),
        Some(proto_write_response::Response::Deleted(deleted)) => Ok(Some(WriteResponse::Deleted {
            existed: deleted.existed,
        })),
        Some(proto_write_response::Response::Synced(_)) => Ok(Some(WriteResponse::Synced)),
        None => Err(DispatcheeError::LostContact(
            "Replica sent an empty write response".to_string(),
        )),
    }
}

pub(crate) fn dispatchee_error_to_proto(error: DispatcheeError) -> ProtoDispatcheeError {
    let err = match error {
        DispatcheeError::LostContact(message) => {
            proto_dispatchee_error::Err::LostContact(ProtoLostContact { message })
        }
        DispatcheeError::Interrupted => proto_dispatchee_error::Err::Interrupted(ProtoEmpty {}),
        DispatcheeError::NotStreaming => proto_dispatchee_error::Err::NotStreaming(ProtoEmpty {}),
        e @ DispatcheeError::BackfillQueueFull(_) => proto_dispatchee_error::Err::ServerFault(ProtoServerFault {
            message: e.to_string(),
        }),
        DispatcheeError::Store(e) => proto_dispatchee_error::Err::ServerFault(ProtoServerFault {
            message: e.to_string(),
        }),
    };

    ProtoDispatcheeError { err: Some(err) }
}

pub(crate) fn dispatchee_error_from_proto(error: ProtoDispatcheeError) -> DispatcheeError {
    match error.err {
        Some(proto_dispatchee_error::Err::LostContact(e)) => DispatcheeError::LostContact(e.message),
        Some(proto_dispatchee_error::Err::Interrupted(_)) => DispatcheeError::Interrupted,
        Some(proto_dispatchee_error::Err::NotStreaming(_)) => DispatcheeError::NotStreaming,
        Some(proto_dispatchee_error::Err::ServerFault(e)) => {
            DispatcheeError::LostContact(format!("Replica fault: {}", e.message))
        }
        None => DispatcheeError::LostContact("Replica sent an empty error".to_string()),
    }
}

pub(crate) fn endpoint_error_to_proto(error: EndpointError) -> ProtoEndpointError {
    let err = match error {
        EndpointError::LostContact(message) => proto_endpoint_error::Err::LostContact(ProtoLostContact { message }),
        EndpointError::NotRegistered(id) => proto_endpoint_error::Err::NotRegistered(ProtoNotRegistered {
            registration_id: id.as_u64(),
        }),
        EndpointError::WrongRegion(region) => proto_endpoint_error::Err::WrongRegion(ProtoWrongRegion {
            region: Some(region_to_proto(&region)),
        }),
        EndpointError::Interrupted => proto_endpoint_error::Err::Interrupted(ProtoEmpty {}),
        EndpointError::Store(e) => proto_endpoint_error::Err::ServerFault(ProtoServerFault {
            message: e.to_string(),
        }),
    };

    ProtoEndpointError { err: Some(err) }
}

pub(crate) fn endpoint_error_from_proto(error: Option<ProtoEndpointError>) -> EndpointError {
    match error.and_then(|e| e.err) {
        Some(proto_endpoint_error::Err::LostContact(e)) => EndpointError::LostContact(e.message),
        Some(proto_endpoint_error::Err::NotRegistered(e)) => {
            EndpointError::NotRegistered(RegistrationId(e.registration_id))
        }
        Some(proto_endpoint_error::Err::WrongRegion(e)) => match region_from_proto(e.region) {
            Ok(region) => EndpointError::WrongRegion(region),
            Err(_) => EndpointError::LostContact("Primary sent a malformed region".to_string()),
        },
        Some(proto_endpoint_error::Err::Interrupted(_)) => EndpointError::Interrupted,
        Some(proto_endpoint_error::Err::ServerFault(e)) => {
            EndpointError::LostContact(format!("Primary fault: {}", e.message))
        }
        None => EndpointError::LostContact("Primary sent an empty error".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_ids_keep_both_halves() {
        let branch = BranchId::from_u128((7u128 << 64) | 9);
        assert_eq!(branch_from_proto(Some(branch_to_proto(branch))).unwrap(), branch);
    }

    #[test]
    fn unbounded_and_empty_right_keys_differ() {
        let unbounded = Region::from_key_range(Key::from("a"), None);
        let empty_right = Region::from_key_range(Key::from("a"), Some(Key::min()));

        assert_eq!(region_from_proto(Some(region_to_proto(&unbounded))).unwrap(), unbounded);
        assert_eq!(
            region_from_proto(Some(region_to_proto(&empty_right))).unwrap(),
            empty_right
        );
    }

    #[test]
    fn out_of_space_hash_range_is_rejected() {
        let mut proto = region_to_proto(&Region::universe());
        proto.hash_end = HASH_SPACE + 1;

        assert!(region_from_proto(Some(proto)).is_err());
    }
}
