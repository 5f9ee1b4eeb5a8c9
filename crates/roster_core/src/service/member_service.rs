//! Member use-case service.
//!
//! # Responsibility
//! - Provide the listing, DTO-listing and seeding entry points callers use.
//! - Delegate persistence to repository implementations.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Listing without an explicit request uses the configured paging
//!   defaults; DTO listings have their own default size.

use crate::config::PagingConfig;
use crate::model::{Member, MemberId};
use crate::page::{Page, PageRequest};
use crate::projection::MemberDto;
use crate::repo::{MemberRepository, RepoError, RepoResult};
use log::info;

/// Use-case service wrapper over a member repository.
pub struct MemberService<R: MemberRepository> {
    repo: R,
    paging: PagingConfig,
}

impl<R: MemberRepository> MemberService<R> {
    pub fn new(repo: R, paging: PagingConfig) -> Self {
        Self { repo, paging }
    }

    pub fn repository(&mut self) -> &mut R {
        &mut self.repo
    }

    /// Builds a request from optional query parameters, filling gaps from
    /// the paging configuration.
    pub fn page_request(
        &self,
        page: Option<u32>,
        size: Option<u32>,
        sort: Option<&str>,
    ) -> RepoResult<PageRequest> {
        PageRequest::from_params(page, size, sort, &self.paging)
    }

    /// First page with the configured size and sort.
    pub fn default_request(&self) -> RepoResult<PageRequest> {
        self.page_request(None, None, None)
    }

    /// Request for `list_member_dtos`; gaps use the DTO page size and no
    /// explicit ordering.
    pub fn dto_page_request(
        &self,
        page: Option<u32>,
        size: Option<u32>,
        sort: Option<&str>,
    ) -> RepoResult<PageRequest> {
        PageRequest::from_dto_params(page, size, sort, &self.paging)
    }

    pub fn list_members(&mut self, request: &PageRequest) -> RepoResult<Page<Member>> {
        self.repo.find_all_paged(request)
    }

    /// Lists members as DTOs; each team is resolved lazily.
    pub fn list_member_dtos(&mut self, request: &PageRequest) -> RepoResult<Page<MemberDto>> {
        let page = self.repo.find_all_paged(request)?;
        page.try_map(|member| {
            let team = self.repo.team_of(&member)?;
            MemberDto::from_member(&member, team.as_ref())
        })
    }

    /// Inserts `user0..user{count-1}`, each aged by its index.
    pub fn seed_members(&mut self, count: u32) -> RepoResult<Vec<MemberId>> {
        let mut ids = Vec::with_capacity(count as usize);
        for index in 0..count {
            let saved = self
                .repo
                .save(Member::new(format!("user{index}"), i64::from(index)))?;
            ids.push(saved.id().ok_or(RepoError::Transient("member"))?);
        }
        info!("event=seed_members module=service status=ok count={count}");
        Ok(ids)
    }
}
