//! Membership and endpoint resolution for fan-out.
//!
//! # Responsibility
//! - Turn a circle, a user or a set of users into deliverable endpoints.
//!
//! # Invariants
//! - Member sets are keyed by user id, so someone sharing several circles
//!   with the actor appears once.
//! - The excluded user (the actor) never appears in a resolved member set.
//! - Reads are plain lookups; no transaction is opened.

use crate::model::circle::CircleId;
use crate::model::endpoint::DeviceEndpoint;
use crate::model::user::UserId;
use crate::repo::circle_repo::CircleRepository;
use crate::repo::endpoint_repo::EndpointRepository;
use crate::repo::error::{RepoError, RepoResult};
use std::collections::BTreeSet;

/// Resolves fan-out targets over repository implementations.
pub struct FanoutResolver<C: CircleRepository, E: EndpointRepository> {
    circles: C,
    endpoints: E,
}

impl<C: CircleRepository, E: EndpointRepository> FanoutResolver<C, E> {
    pub fn new(circles: C, endpoints: E) -> Self {
        Self { circles, endpoints }
    }

    /// Registered endpoints of one user.
    pub fn resolve_endpoints(&self, user_id: UserId) -> RepoResult<BTreeSet<DeviceEndpoint>> {
        Ok(self.endpoints.list_endpoints(user_id)?.into_iter().collect())
    }

    /// Members of `circle_id` except `exclude_user_id`.
    ///
    /// Returns `NotFound` when the circle does not exist.
    pub fn resolve_circle_members(
        &self,
        circle_id: CircleId,
        exclude_user_id: UserId,
    ) -> RepoResult<BTreeSet<UserId>> {
        let circle = self
            .circles
            .get_circle(circle_id)?
            .ok_or(RepoError::NotFound {
                entity: "circle",
                id: circle_id,
            })?;
        Ok(circle
            .members
            .into_iter()
            .filter(|member| *member != exclude_user_id)
            .collect())
    }

    /// Union of members across every circle `user_id` belongs to, minus
    /// `user_id` itself.
    pub fn resolve_all_circles_members(&self, user_id: UserId) -> RepoResult<BTreeSet<UserId>> {
        let mut members = BTreeSet::new();
        for circle in self.circles.list_circles_for_user(user_id)? {
            members.extend(circle.members);
        }
        members.remove(&user_id);
        Ok(members)
    }

    /// Endpoints of every user in `users`, flattened.
    pub fn resolve_endpoints_for(&self, users: &BTreeSet<UserId>) -> RepoResult<Vec<DeviceEndpoint>> {
        let mut endpoints = BTreeSet::new();
        for user_id in users {
            endpoints.extend(self.resolve_endpoints(*user_id)?);
        }
        Ok(endpoints.into_iter().collect())
    }
}
