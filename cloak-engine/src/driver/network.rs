use serde::{Deserialize, Serialize};

use crate::generator::MacAddress;

pub const DEFAULT_ADAPTER_BASE: u32 = 1;

/// Hands out adapter slots for one machine. Indices only ever increase, so
/// two adapters on the same VM never share a slot.
#[derive(Debug, Clone)]
pub struct AdapterCounter {
    next: u32,
}

impl AdapterCounter {
    pub fn new(base: u32) -> Self {
        Self { next: base }
    }

    pub fn next_index(&mut self) -> u32 {
        let index = self.next;
        self.next += 1;
        index
    }

    pub fn peek(&self) -> u32 {
        self.next
    }
}

impl Default for AdapterCounter {
    fn default() -> Self {
        Self::new(DEFAULT_ADAPTER_BASE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NetworkAdapter {
    Hostonly { mac: Option<MacAddress> },
    Bridged { interface: String, mac: Option<MacAddress> },
    Nat { mac: Option<MacAddress> },
}
