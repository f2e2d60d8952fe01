use crate::pipeline::types::Timestamp;
use crate::pipeline::vendor::VendorTable;
use pnet::util::MacAddr;
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;

/// Everything learned about one hardware address over the run.
///
/// Created on the first packet sent from the address and updated in place on
/// every later one; a record is never replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub mac:          MacAddr,
    /// Manufacturer from the OUI table, or `"unknown"`.
    pub vendor:       String,
    /// Locally administered bit set: a randomised or hand-assigned address
    /// whose vendor lookup is meaningless.
    pub randomized:   bool,
    /// Network addresses this device sent from. Ordered so output is stable.
    pub addresses:    BTreeSet<IpAddr>,
    pub first_seen:   Timestamp,
    pub last_seen:    Timestamp,
    pub packet_count: u64,
}

impl DeviceRecord {
    fn new(mac: MacAddr, vendor: &str, now: Timestamp) -> Self {
        Self {
            mac,
            vendor: vendor.to_string(),
            randomized: is_locally_administered(&mac),
            addresses: BTreeSet::new(),
            first_seen: now,
            last_seen: now,
            packet_count: 0,
        }
    }

    /// Accounts for one more packet from this device.
    fn update(&mut self, ip: Option<IpAddr>, now: Timestamp) {
        self.packet_count += 1;
        self.first_seen = self.first_seen.min(now);
        self.last_seen = self.last_seen.max(now);
        if let Some(ip) = ip {
            self.addresses.insert(ip);
        }
    }

    fn absorb(&mut self, other: DeviceRecord) {
        self.packet_count += other.packet_count;
        self.first_seen = self.first_seen.min(other.first_seen);
        self.last_seen = self.last_seen.max(other.last_seen);
        self.addresses.extend(other.addresses);
    }
}

/// Device inventory keyed by source hardware address.
#[derive(Debug, Default, Clone)]
pub struct DeviceTracker {
    devices: HashMap<MacAddr, DeviceRecord>,
}

impl DeviceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one packet sent by `mac`, returning `true` when the device is new.
    ///
    /// Callers must filter out broadcast, multicast and all-zero addresses
    /// first (see [`is_trackable`]).
    pub fn observe(
        &mut self,
        mac: MacAddr,
        ip: Option<IpAddr>,
        now: Timestamp,
        vendors: &VendorTable,
    ) -> bool {
        let mut is_new = false;
        let record = self.devices.entry(mac).or_insert_with(|| {
            is_new = true;
            DeviceRecord::new(mac, vendors.resolve(&mac), now)
        });
        record.update(ip, now);
        is_new
    }

    pub fn get(&self, mac: &MacAddr) -> Option<&DeviceRecord> {
        self.devices.get(mac)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn records(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    /// Folds another tracker's records into this one.
    pub fn merge(&mut self, other: DeviceTracker) {
        for (mac, record) in other.devices {
            match self.devices.get_mut(&mac) {
                Some(existing) => existing.absorb(record),
                None => {
                    self.devices.insert(mac, record);
                }
            }
        }
    }
}

/// `true` for unicast, non-zero hardware addresses that identify one device.
pub fn is_trackable(mac: &MacAddr) -> bool {
    let is_group = mac.0 & 0x01 != 0;
    let is_zero = [mac.0, mac.1, mac.2, mac.3, mac.4, mac.5] == [0; 6];
    !is_group && !is_zero
}

fn is_locally_administered(mac: &MacAddr) -> bool {
    mac.0 & 0x02 != 0
}
