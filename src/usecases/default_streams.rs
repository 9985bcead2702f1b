//! Default streams and named default stream groups offered to new users.

use crate::domain::policy::{MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH};
use crate::domain::{DefaultStreamGroup, DomainError, Stream, User};
use crate::ports::{ChatStore, NotificationSink};
use crate::usecases::access::{access_stream_by_id, access_stream_by_name};
use crate::usecases::unit_of_work::UnitOfWork;
use std::sync::Arc;
use tracing::info;

fn require_manager(actor: &User) -> Result<(), DomainError> {
    if actor.can_manage_default_streams() {
        Ok(())
    } else {
        Err(DomainError::forbidden(
            "You do not have permission to change default channels.",
        ))
    }
}

fn check_group_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() || name.chars().any(|c| c.is_control()) {
        return Err(DomainError::invalid(format!(
            "Invalid default channel group name '{}'",
            name
        )));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(DomainError::invalid(format!(
            "Default channel group name too long (limit: {} characters)",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

fn check_group_description(description: &str) -> Result<(), DomainError> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(DomainError::invalid(format!(
            "Default channel group description too long (limit: {} characters)",
            MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(())
}

fn private_stream_error() -> DomainError {
    DomainError::invalid("Private channels cannot be made default.")
}

/// How `update_group_streams` changes a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStreamsOp {
    Add,
    Remove,
}

impl GroupStreamsOp {
    pub fn parse(op: &str) -> Result<Self, DomainError> {
        match op {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            _ => Err(DomainError::invalid(
                "Invalid value for \"op\". Specify one of \"add\" or \"remove\".",
            )),
        }
    }
}

pub struct DefaultStreamService {
    store: Arc<dyn ChatStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl DefaultStreamService {
    pub fn new(store: Arc<dyn ChatStore>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { store, notifier }
    }

    pub async fn add_default_stream(&self, actor: &User, stream_id: i64) -> Result<(), DomainError> {
        require_manager(actor)?;
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = async {
            let (stream, _) = access_stream_by_id(uow.tx(), actor, stream_id, false).await?;
            if stream.invite_only {
                return Err(private_stream_error());
            }
            uow.tx().add_default_stream(stream.id).await
        }
        .await;
        uow.finish(result, self.notifier.as_ref()).await
    }

    pub async fn remove_default_stream(
        &self,
        actor: &User,
        stream_id: i64,
    ) -> Result<(), DomainError> {
        require_manager(actor)?;
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = async {
            let (stream, _) = access_stream_by_id(uow.tx(), actor, stream_id, true).await?;
            uow.tx().remove_default_stream(stream.id).await
        }
        .await;
        uow.finish(result, self.notifier.as_ref()).await
    }

    pub async fn list_groups(&self) -> Result<Vec<DefaultStreamGroup>, DomainError> {
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = uow.tx().default_stream_groups().await;
        uow.finish(result, self.notifier.as_ref()).await
    }

    pub async fn create_group(
        &self,
        actor: &User,
        name: &str,
        description: &str,
        stream_names: &[String],
    ) -> Result<DefaultStreamGroup, DomainError> {
        require_manager(actor)?;
        check_group_name(name)?;
        check_group_description(description)?;

        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = async {
            let streams = access_streams(&mut uow, actor, stream_names).await?;
            if uow.tx().default_stream_group_by_name(name).await?.is_some() {
                return Err(DomainError::invalid(format!(
                    "Default channel group '{}' already exists",
                    name
                )));
            }
            let defaults = uow.tx().default_stream_ids().await?;
            let mut ids = Vec::with_capacity(streams.len());
            for stream in &streams {
                check_addable(stream, &defaults, name)?;
                if !ids.contains(&stream.id) {
                    ids.push(stream.id);
                }
            }
            let group = uow
                .tx()
                .insert_default_stream_group(name, description, &ids)
                .await?;
            info!(group_id = group.id, name = %group.name, streams = ids.len(), "default stream group created");
            Ok(group)
        }
        .await;
        uow.finish(result, self.notifier.as_ref()).await
    }

    pub async fn update_group_info(
        &self,
        actor: &User,
        group_id: i64,
        new_name: Option<&str>,
        new_description: Option<&str>,
    ) -> Result<(), DomainError> {
        require_manager(actor)?;
        if new_name.is_none_or(str::is_empty) && new_description.is_none_or(str::is_empty) {
            return Err(DomainError::invalid(
                "You must pass \"new_description\" or \"new_group_name\".",
            ));
        }

        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = async {
            let mut group = access_group(&mut uow, group_id).await?;
            if let Some(name) = new_name {
                if group.name == name {
                    return Err(DomainError::invalid(format!(
                        "This default channel group is already named '{}'",
                        name
                    )));
                }
                check_group_name(name)?;
                if uow.tx().default_stream_group_by_name(name).await?.is_some() {
                    return Err(DomainError::invalid(format!(
                        "Default channel group '{}' already exists",
                        name
                    )));
                }
                group.name = name.to_string();
            }
            if let Some(description) = new_description {
                check_group_description(description)?;
                group.description = description.to_string();
            }
            uow.tx().update_default_stream_group(&group).await
        }
        .await;
        uow.finish(result, self.notifier.as_ref()).await
    }

    pub async fn update_group_streams(
        &self,
        actor: &User,
        group_id: i64,
        op: &str,
        stream_names: &[String],
    ) -> Result<(), DomainError> {
        require_manager(actor)?;
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = async {
            let mut group = access_group(&mut uow, group_id).await?;
            let streams = access_streams(&mut uow, actor, stream_names).await?;
            match GroupStreamsOp::parse(op)? {
                GroupStreamsOp::Add => {
                    let defaults = uow.tx().default_stream_ids().await?;
                    for stream in &streams {
                        check_addable(stream, &defaults, &group.name)?;
                        if group.stream_ids.contains(&stream.id) {
                            return Err(DomainError::invalid(format!(
                                "Channel '{}' is already present in default channel group '{}'",
                                stream.name, group.name
                            )));
                        }
                        group.stream_ids.push(stream.id);
                    }
                }
                GroupStreamsOp::Remove => {
                    for stream in &streams {
                        if !group.stream_ids.contains(&stream.id) {
                            return Err(DomainError::invalid(format!(
                                "Channel '{}' is not present in default channel group '{}'",
                                stream.name, group.name
                            )));
                        }
                        group.stream_ids.retain(|id| *id != stream.id);
                    }
                }
            }
            uow.tx().update_default_stream_group(&group).await
        }
        .await;
        uow.finish(result, self.notifier.as_ref()).await
    }

    pub async fn delete_group(&self, actor: &User, group_id: i64) -> Result<(), DomainError> {
        require_manager(actor)?;
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = async {
            let group = access_group(&mut uow, group_id).await?;
            uow.tx().delete_default_stream_group(group.id).await?;
            info!(group_id, "default stream group deleted");
            Ok::<_, DomainError>(())
        }
        .await;
        uow.finish(result, self.notifier.as_ref()).await
    }
}

async fn access_group(
    uow: &mut UnitOfWork,
    group_id: i64,
) -> Result<DefaultStreamGroup, DomainError> {
    uow.tx()
        .default_stream_group(group_id)
        .await?
        .ok_or_else(|| {
            DomainError::not_found(format!(
                "Default channel group with id '{}' does not exist.",
                group_id
            ))
        })
}

async fn access_streams(
    uow: &mut UnitOfWork,
    actor: &User,
    names: &[String],
) -> Result<Vec<Stream>, DomainError> {
    let mut streams = Vec::with_capacity(names.len());
    for name in names {
        let (stream, _) = access_stream_by_name(uow.tx(), actor, name, false).await?;
        streams.push(stream);
    }
    Ok(streams)
}

fn check_addable(stream: &Stream, defaults: &[i64], group_name: &str) -> Result<(), DomainError> {
    if defaults.contains(&stream.id) {
        return Err(DomainError::invalid(format!(
            "'{}' is a default channel and cannot be added to '{}'",
            stream.name, group_name
        )));
    }
    if stream.invite_only {
        return Err(private_stream_error());
    }
    Ok(())
}
