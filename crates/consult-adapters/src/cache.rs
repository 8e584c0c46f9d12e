//! Short-lived read-through caches for the directory and policy ports.
//!
//! Open-item counts and the last assignment of a unit are never cached:
//! load balancing and round-robin rotation read them on every decision.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use consult_core::consult::Urgency;
use consult_core::ids::{MemberId, UnitId};
use consult_core::member::UnitMember;
use consult_core::policy::AssignmentPolicy;
use consult_core::sla::SlaTable;
use consult_ports::error::PortError;
use consult_ports::outbound::{Directory, PolicyStore};

struct TtlMap<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K: Eq + Hash, V: Clone> TtlMap<K, V> {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    fn put(&self, key: K, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
            entries.insert(key, (Instant::now(), value));
        }
    }
}

async fn read_through<K, V, F>(map: &TtlMap<K, V>, key: K, load: F) -> Result<V, PortError>
where
    K: Eq + Hash,
    V: Clone,
    F: std::future::Future<Output = Result<V, PortError>>,
{
    if let Some(hit) = map.get(&key) {
        return Ok(hit);
    }
    let value = load.await?;
    map.put(key, value.clone());
    Ok(value)
}

pub struct CachedDirectory<D: Directory> {
    inner: D,
    eligible: TtlMap<(UnitId, u32), Vec<UnitMember>>,
    members: TtlMap<MemberId, Option<UnitMember>>,
    heads: TtlMap<UnitId, Option<MemberId>>,
    on_call: TtlMap<UnitId, Option<MemberId>>,
}

impl<D: Directory> CachedDirectory<D> {
    pub fn new(inner: D, ttl: Duration) -> Self {
        Self {
            inner,
            eligible: TtlMap::new(ttl),
            members: TtlMap::new(ttl),
            heads: TtlMap::new(ttl),
            on_call: TtlMap::new(ttl),
        }
    }
}

#[async_trait]
impl<D: Directory> Directory for CachedDirectory<D> {
    async fn list_eligible_members(
        &self,
        unit: &UnitId,
        min_seniority: u32,
    ) -> Result<Vec<UnitMember>, PortError> {
        read_through(
            &self.eligible,
            (unit.clone(), min_seniority),
            self.inner.list_eligible_members(unit, min_seniority),
        )
        .await
    }

    /// Cached per unit; a shift boundary may be seen up to one TTL late.
    async fn on_call_member(
        &self,
        unit: &UnitId,
        at: DateTime<Utc>,
    ) -> Result<Option<MemberId>, PortError> {
        read_through(&self.on_call, unit.clone(), self.inner.on_call_member(unit, at)).await
    }

    async fn open_item_count(&self, member: &MemberId) -> Result<u32, PortError> {
        self.inner.open_item_count(member).await
    }

    async fn last_assigned_member(&self, unit: &UnitId) -> Result<Option<MemberId>, PortError> {
        self.inner.last_assigned_member(unit).await
    }

    async fn find_member(&self, member: &MemberId) -> Result<Option<UnitMember>, PortError> {
        read_through(&self.members, member.clone(), self.inner.find_member(member)).await
    }

    async fn unit_head(&self, unit: &UnitId) -> Result<Option<MemberId>, PortError> {
        read_through(&self.heads, unit.clone(), self.inner.unit_head(unit)).await
    }
}

pub struct CachedPolicies<P: PolicyStore> {
    inner: P,
    policies: TtlMap<(UnitId, Urgency), Option<AssignmentPolicy>>,
    slas: TtlMap<UnitId, Option<SlaTable>>,
}

impl<P: PolicyStore> CachedPolicies<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            policies: TtlMap::new(ttl),
            slas: TtlMap::new(ttl),
        }
    }
}

#[async_trait]
impl<P: PolicyStore> PolicyStore for CachedPolicies<P> {
    async fn get_policy(
        &self,
        unit: &UnitId,
        urgency: Urgency,
    ) -> Result<Option<AssignmentPolicy>, PortError> {
        read_through(
            &self.policies,
            (unit.clone(), urgency),
            self.inner.get_policy(unit, urgency),
        )
        .await
    }

    async fn get_sla(&self, unit: &UnitId) -> Result<Option<SlaTable>, PortError> {
        read_through(&self.slas, unit.clone(), self.inner.get_sla(unit)).await
    }
}
