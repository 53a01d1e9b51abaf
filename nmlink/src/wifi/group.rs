//! Merging of scan results that belong to the same logical network.

use log::warn;
use serde::Serialize;
use std::time::SystemTime;
use zvariant::OwnedObjectPath;

use crate::api::models::WifiMode;
use crate::types::constants::STRENGTH_EPSILON;
use crate::wifi::access_point::{AccessPoint, GroupingKey};

/// One logical network as shown to the user.
///
/// A group owns one or more [`AccessPoint`]s sharing a [`GroupingKey`]. Its
/// strength is the strongest member's and its last-connected time is the
/// newest any member ever had. A group is never empty while it is reachable
/// from a [`WifiLink`](crate::WifiLink); the link drops it together with its
/// last member.
#[derive(Debug, Clone, Serialize)]
pub struct AccessPointGroup {
    key: GroupingKey,
    members: Vec<AccessPoint>,
    strength: f64,
    last_connected: Option<SystemTime>,
}

impl AccessPointGroup {
    pub(crate) fn new(ap: AccessPoint) -> Self {
        Self {
            key: ap.key(),
            strength: ap.strength(),
            last_connected: ap.last_connected(),
            members: vec![ap],
        }
    }

    /// Adds a member. Callers look the group up by `ap.key()` first, so the
    /// keys always match.
    pub(crate) fn add(&mut self, ap: AccessPoint) {
        debug_assert_eq!(self.key, ap.key(), "access point added to foreign group");

        self.strength = self.strength.max(ap.strength());
        if let Some(t) = ap.last_connected() {
            self.update_last_connected(t);
        }
        self.members.push(ap);
    }

    /// Removes the member at `path` and recomputes the strength from the
    /// members that remain.
    ///
    /// The last-connected time is kept: a network that has been used stays
    /// used even when the scan entry that carried the timestamp goes away.
    pub(crate) fn remove(&mut self, path: &OwnedObjectPath) -> Option<AccessPoint> {
        let Some(idx) = self.members.iter().position(|m| m.path() == path) else {
            warn!(
                "Access point {} is not a member of group '{}'",
                path.as_str(),
                self.ssid()
            );
            return None;
        };

        let removed = self.members.remove(idx);
        self.strength = 0.0;
        self.recompute_strength();
        Some(removed)
    }

    /// Sets the strength of one member and recomputes the group.
    ///
    /// Returns `true` if the group strength changed noticeably.
    pub(crate) fn set_member_strength(&mut self, path: &OwnedObjectPath, strength: f64) -> bool {
        match self.members.iter_mut().find(|m| m.path() == path) {
            Some(member) => {
                member.set_strength(strength);
                self.recompute_strength()
            }
            None => false,
        }
    }

    pub(crate) fn set_member_last_connected(&mut self, path: &OwnedObjectPath, when: SystemTime) {
        if let Some(member) = self.members.iter_mut().find(|m| m.path() == path) {
            member.set_last_connected(when);
            self.update_last_connected(when);
        }
    }

    /// Sets the strength to the members' maximum.
    ///
    /// Returns `true` only if it moved by more than [`STRENGTH_EPSILON`].
    pub(crate) fn recompute_strength(&mut self) -> bool {
        let max = self
            .members
            .iter()
            .map(AccessPoint::strength)
            .fold(0.0, f64::max);

        let changed = (max - self.strength).abs() > STRENGTH_EPSILON;
        self.strength = max;
        changed
    }

    /// Raises the last-connected time if `when` is newer.
    pub(crate) fn update_last_connected(&mut self, when: SystemTime) {
        if self.last_connected.is_none_or(|t| when > t) {
            self.last_connected = Some(when);
        }
    }

    /// The key shared by all members.
    pub fn key(&self) -> &GroupingKey {
        &self.key
    }

    /// Path of the first member, used as the target of a connect request.
    pub fn path(&self) -> Option<&OwnedObjectPath> {
        self.members.first().map(AccessPoint::path)
    }

    pub fn ssid(&self) -> &str {
        self.members.first().map_or("", AccessPoint::ssid)
    }

    pub fn raw_ssid(&self) -> &[u8] {
        self.key.ssid()
    }

    pub fn secured(&self) -> bool {
        !self.key.security().is_empty()
    }

    pub fn adhoc(&self) -> bool {
        self.key.mode() != WifiMode::Infra
    }

    pub fn mode(&self) -> WifiMode {
        self.key.mode()
    }

    /// Strongest member's signal strength.
    pub fn strength(&self) -> f64 {
        self.strength
    }

    /// Newest last-connected time seen on any member.
    pub fn last_connected(&self) -> Option<SystemTime> {
        self.last_connected
    }

    pub fn num_members(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn has_member(&self, path: &OwnedObjectPath) -> bool {
        self.members.iter().any(|m| m.path() == path)
    }

    pub fn members(&self) -> &[AccessPoint] {
        &self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScanRecord;
    use std::time::Duration;

    fn path(n: u32) -> OwnedObjectPath {
        OwnedObjectPath::try_from(format!("/org/freedesktop/NetworkManager/AccessPoint/{n}"))
            .unwrap()
    }

    fn ap(n: u32, strength: u8) -> AccessPoint {
        AccessPoint::new(
            path(n),
            ScanRecord {
                ssid: b"Cafe".to_vec(),
                mode: 2,
                strength,
                ..Default::default()
            },
        )
    }

    fn group_of(strengths: &[u8]) -> AccessPointGroup {
        let mut it = strengths.iter().enumerate();
        let (i, s) = it.next().unwrap();
        let mut group = AccessPointGroup::new(ap(i as u32, *s));
        for (i, s) in it {
            group.add(ap(i as u32, *s));
        }
        group
    }

    #[test]
    fn strength_is_max_of_members() {
        let group = group_of(&[30, 80, 50]);
        assert_eq!(group.num_members(), 3);
        assert_eq!(group.strength(), 80.0);
        assert_eq!(group.path(), Some(&path(0)));
    }

    #[test]
    fn removing_strongest_rescans_members() {
        let mut group = group_of(&[30, 80, 50]);
        let removed = group.remove(&path(1)).unwrap();
        assert_eq!(removed.strength(), 80.0);
        assert_eq!(group.strength(), 50.0);
        assert!(!group.has_member(&path(1)));
    }

    #[test]
    fn removing_last_member_empties_group() {
        let mut group = group_of(&[30]);
        group.remove(&path(0)).unwrap();
        assert!(group.is_empty());
        assert_eq!(group.strength(), 0.0);
    }

    #[test]
    fn removing_unknown_member_is_noop() {
        let mut group = group_of(&[30, 40]);
        assert!(group.remove(&path(9)).is_none());
        assert_eq!(group.num_members(), 2);
        assert_eq!(group.strength(), 40.0);
    }

    #[test]
    fn small_strength_changes_are_not_reported() {
        let mut group = group_of(&[30, 80]);
        assert!(!group.set_member_strength(&path(1), 80.005));
        assert!(group.set_member_strength(&path(1), 20.0));
        assert_eq!(group.strength(), 30.0);
        assert!(!group.set_member_strength(&path(7), 90.0));
    }

    #[test]
    fn last_connected_survives_removal() {
        let mut group = group_of(&[30, 80]);
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        group.set_member_last_connected(&path(1), t);
        assert_eq!(group.last_connected(), Some(t));

        group.remove(&path(1));
        assert_eq!(group.last_connected(), Some(t));

        group.update_last_connected(SystemTime::UNIX_EPOCH);
        assert_eq!(group.last_connected(), Some(t));
    }

    #[test]
    fn add_takes_newest_last_connected() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        let t1 = SystemTime::UNIX_EPOCH + Duration::from_secs(20);
        let mut first = ap(0, 10);
        first.set_last_connected(t1);
        let mut second = ap(1, 10);
        second.set_last_connected(t0);

        let mut group = AccessPointGroup::new(first);
        group.add(second);
        assert_eq!(group.last_connected(), Some(t1));
    }

    #[test]
    fn derived_properties_follow_key() {
        let group = group_of(&[10]);
        assert_eq!(group.ssid(), "Cafe");
        assert_eq!(group.raw_ssid(), b"Cafe");
        assert!(!group.secured());
        assert!(!group.adhoc());
        assert_eq!(group.mode(), WifiMode::Infra);
    }
}
