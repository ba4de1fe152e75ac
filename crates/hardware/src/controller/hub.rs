//! Top-level memory controller.
//!
//! The `ControllerHub` sits between the interconnect and the channels. It
//! accepts requests, walks each one through translation and (for hot rows)
//! migration staging, fans the resulting transactions out to the channel
//! schedulers, and returns responses with retry on back-pressure.
//!
//! A request moves through `Translate → Issue → (Update → Migrate) → Finish`,
//! advancing at most one stage per DRAM tick. It is released once it has
//! reached a terminal stage and no response work remains.

use serde_json::{Value, json};
use tracing::{debug, trace, warn};

use super::channel::ChannelController;
use super::clock::ClockDomain;
use super::pool::{Pool, SlotId};
use super::request::{Completion, Origin, RequestEntry, Stage};
use super::upstream::Upstream;
use crate::common::{ConfigError, Coordinates, MemoryOp, Request, Response};
use crate::config::Config;
use crate::dram::{CommandType, DramConfig};
use crate::mapping::AddressMapper;
use crate::stats::MemoryCounter;

/// Memory controller front end and clock driver.
#[derive(Debug)]
pub struct ControllerHub {
    config: Config,
    dram: DramConfig,
    mapper: AddressMapper,
    channels: Vec<ChannelController>,
    requests: Pool<RequestEntry>,
    lookups: Vec<u64>,
    retries: Vec<SlotId>,
    completions: Vec<Completion>,
    clock: ClockDomain,
    stats: MemoryCounter,
    full_asserted: bool,
}

impl ControllerHub {
    /// Builds a controller from a configuration.
    ///
    /// # Errors
    ///
    /// Returns the first configuration or geometry constraint violated.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let dram = DramConfig::new(config)?;
        let mapper = AddressMapper::new(config, &dram);
        let channels = (0..dram.channel_count)
            .map(|id| ChannelController::new(id, config, &dram))
            .collect();
        debug!(
            channels = dram.channel_count,
            ranks = dram.rank_count,
            banks = dram.bank_count,
            rows = dram.row_count,
            "controller built"
        );
        Ok(Self {
            config: config.clone(),
            clock: ClockDomain::new(dram.tck_ps, config.memory.host_freq_hz),
            mapper,
            channels,
            requests: Pool::new(config.controller.request_queue_size),
            lookups: Vec::with_capacity(config.controller.max_pending_lookups),
            retries: Vec::new(),
            completions: Vec::new(),
            stats: MemoryCounter::default(),
            full_asserted: false,
            dram,
        })
    }

    /// Accepts a request from the interconnect.
    ///
    /// Evictions are acknowledged and dropped. An update to an address whose
    /// newest queued request is an update not yet handed to a channel is
    /// merged into it.
    ///
    /// # Returns
    ///
    /// `false` if the request pool is full; the caller retries later.
    pub fn handle_request(&mut self, request: Request, upstream: &mut dyn Upstream) -> bool {
        let command = match request.op {
            MemoryOp::Evict => {
                trace!(id = request.id, address = request.address, "evict dropped");
                return true;
            }
            MemoryOp::Update => {
                if self.coalesces(&request) {
                    trace!(id = request.id, address = request.address, "update merged");
                    return true;
                }
                CommandType::Write
            }
            MemoryOp::Read | MemoryOp::Write | MemoryOp::Migrate => CommandType::Read,
        };

        let coords = self.mapper.extract(request.address);
        if self
            .requests
            .alloc(RequestEntry::new(request, command, coords))
            .is_none()
        {
            return false;
        }
        self.stats.access.queue_length += self.requests.len() as u64 - 1;
        trace!(id = request.id, op = ?request.op, %coords, "request accepted");

        if self.requests.is_full() && !self.full_asserted {
            self.full_asserted = true;
            debug!(pending = self.requests.len(), "controller full");
            upstream.set_controller_full(true);
        }
        true
    }

    /// Cancels the live request with `id`.
    ///
    /// A request with no transaction in a channel yet is released at once.
    /// Otherwise it keeps moving through its stages, its response is
    /// suppressed, and it is released when its access completes.
    ///
    /// # Returns
    ///
    /// `false` if no live, unannulled request carries `id`.
    pub fn annul(&mut self, id: u64, upstream: &mut dyn Upstream) -> bool {
        let Some(slot) = self
            .requests
            .iter()
            .find(|(_, e)| e.request.id == id && !e.annulled)
            .map(|(slot, _)| slot)
        else {
            warn!(id, "annul of unknown request");
            return false;
        };

        let Some(entry) = self.requests.get_mut(slot) else {
            return false;
        };
        if entry.stage.is_pending() {
            debug!(id, stage = ?entry.stage, "annulled before issue");
            let _ = self.requests.free(slot);
            self.signal_room(upstream);
            return true;
        }

        debug!(id, stage = ?entry.stage, "annulled in flight");
        entry.annulled = true;
        if entry.stage == Stage::Finish {
            entry.stage = Stage::Annul;
        }
        self.release(slot, upstream);
        true
    }

    /// Advances one host cycle.
    ///
    /// Deliveries refused on the previous cycle are retried first; then the
    /// DRAM clock runs as many ticks as this host cycle spans.
    pub fn cycle(&mut self, upstream: &mut dyn Upstream) {
        for slot in std::mem::take(&mut self.retries) {
            self.deliver(slot, upstream);
        }
        for _ in 0..self.clock.host_cycle() {
            self.tick(upstream);
        }
    }

    fn tick(&mut self, upstream: &mut dyn Upstream) {
        let clock = self.clock.dram_clock();
        self.dispatch(clock, upstream);

        let mut completions = std::mem::take(&mut self.completions);
        for channel in &mut self.channels {
            channel.cycle(clock);
            channel.schedule(clock, &mut self.stats, &mut completions);
        }
        for completion in completions.drain(..) {
            self.complete(completion, upstream);
        }
        self.completions = completions;

        self.clock.advance();
        self.stats
            .energy
            .refresh_from(self.channels.iter().map(|c| c.channel().energy()));
    }

    /// Advances every live request by at most one stage.
    ///
    /// Requests are visited oldest first. Once a channel refuses a
    /// transaction, later requests targeting it wait for the next pass.
    fn dispatch(&mut self, clock: u64, upstream: &mut dyn Upstream) {
        let mut blocked = vec![false; self.channels.len()];
        for slot in self.requests.ids() {
            let Some(&entry) = self.requests.get(slot) else {
                continue;
            };
            let next = match entry.stage {
                Stage::Translate => self.translate(slot, &entry, &mut blocked),
                Stage::Issue => {
                    let origin = Origin::Request(slot);
                    self.submit(&mut blocked, entry.command, entry.coords, origin)
                        .then(|| {
                            if entry.detected {
                                Stage::Update
                            } else {
                                entry.terminal_stage()
                            }
                        })
                }
                Stage::Update => {
                    let line = self.mapper.lookup_coordinates(self.mapper.line_tag(&entry.coords));
                    self.submit(&mut blocked, CommandType::Write, line, Origin::Internal)
                        .then_some(Stage::Migrate)
                }
                Stage::Migrate => {
                    let channel = entry.coords.channel as usize;
                    if blocked[channel] || !self.channels[channel].has_room() {
                        blocked[channel] = true;
                        None
                    } else {
                        let place = self.promote(clock, &entry);
                        let queued = self.channels[channel].add_migration(entry.coords, place);
                        assert!(queued, "channel {channel} refused a migration it had room for");
                        Some(entry.terminal_stage())
                    }
                }
                Stage::Finish | Stage::Annul => None,
            };

            if let Some(stage) = next {
                if let Some(live) = self.requests.get_mut(slot) {
                    live.stage = stage;
                }
                if stage.is_done() {
                    self.release(slot, upstream);
                }
            }
        }
    }

    fn translate(&mut self, slot: SlotId, entry: &RequestEntry, blocked: &mut [bool]) -> Option<Stage> {
        let mut coords = entry.coords;
        if !self.mapper.translate(&mut coords) {
            self.query(&coords, blocked);
            return None;
        }

        let forced = entry.request.op == MemoryOp::Migrate && !coords.is_fast(self.mapper.ratio());
        let detected = self.mapper.detect(&coords) || forced;
        if !self.mapper.allocate(&coords) {
            self.stats.row.count += 1;
        }
        self.stats.access.count += 1;
        if detected {
            debug!(id = entry.request.id, %coords, forced, "hot row");
        }

        let live = self.requests.get_mut(slot)?;
        live.coords = coords;
        live.detected = detected;
        Some(Stage::Issue)
    }

    /// Reads the remap-table line for `coords` unless it is already on its way.
    fn query(&mut self, coords: &Coordinates, blocked: &mut [bool]) {
        let tag = self.mapper.line_tag(coords);
        if self.lookups.contains(&tag) || self.lookups.len() >= self.config.controller.max_pending_lookups {
            return;
        }
        let line = self.mapper.lookup_coordinates(tag);
        if self.submit(blocked, CommandType::Read, line, Origin::Lookup(tag)) {
            self.lookups.push(tag);
            self.stats.row.query += 1;
            trace!(tag, %line, "remap lookup");
        }
    }

    /// Remaps the entry's row into a fast place and returns that place.
    fn promote(&mut self, clock: u64, entry: &RequestEntry) -> u32 {
        let remigrated = self.mapper.promote(clock, &entry.coords);
        self.stats.row.migration += 1;
        if remigrated {
            self.stats.row.remigration += 1;
        }
        let place = self.mapper.forward(&entry.coords);
        debug!(
            id = entry.request.id,
            coords = %entry.coords,
            place,
            remigrated,
            "row promoted"
        );
        place
    }

    /// Hands a transaction to its channel unless that channel is blocked for this pass.
    fn submit(
        &mut self,
        blocked: &mut [bool],
        command: CommandType,
        coords: Coordinates,
        origin: Origin,
    ) -> bool {
        let channel = coords.channel as usize;
        if blocked[channel] {
            return false;
        }
        if self.channels[channel].add_transaction(command, coords, origin) {
            return true;
        }
        blocked[channel] = true;
        false
    }

    fn complete(&mut self, completion: Completion, upstream: &mut dyn Upstream) {
        match completion {
            Completion::Access(slot) => self.deliver(slot, upstream),
            Completion::Lookup(tag) => {
                let Some(position) = self.lookups.iter().position(|&t| t == tag) else {
                    panic!("lookup completion for untracked line {tag:#x}");
                };
                let _ = self.lookups.swap_remove(position);
                self.mapper.update(tag);
            }
        }
    }

    /// Sends the response for `slot`, or swallows it if none is owed.
    fn deliver(&mut self, slot: SlotId, upstream: &mut dyn Upstream) {
        let Some(entry) = self.requests.get_mut(slot) else {
            panic!("completion for vacant request slot {}", slot.0);
        };
        if !entry.annulled && entry.request.op.needs_response() {
            let response = Response {
                request: entry.request,
                has_data: true,
            };
            if !upstream.emit_response(&response) {
                debug!(id = entry.request.id, "response refused; retrying");
                self.retries.push(slot);
                return;
            }
        }
        entry.responded = true;
        self.release(slot, upstream);
    }

    /// Frees `slot` once it is both responded and in a terminal stage.
    fn release(&mut self, slot: SlotId, upstream: &mut dyn Upstream) {
        if !self.requests.get(slot).is_some_and(RequestEntry::is_retired) {
            return;
        }
        let entry = self.requests.free(slot);
        trace!(id = entry.request.id, "request retired");
        self.signal_room(upstream);
    }

    fn signal_room(&mut self, upstream: &mut dyn Upstream) {
        if self.full_asserted && !self.requests.is_full() {
            self.full_asserted = false;
            debug!(pending = self.requests.len(), "controller has room");
            upstream.set_controller_full(false);
        }
    }

    fn coalesces(&self, request: &Request) -> bool {
        self.requests
            .iter()
            .rev()
            .find(|(_, e)| e.request.address == request.address)
            .is_some_and(|(_, e)| {
                e.request.op == MemoryOp::Update && matches!(e.stage, Stage::Translate | Stage::Issue)
            })
    }

    /// Returns the number of live requests.
    #[inline]
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Returns the number of live requests issued by `origin`.
    pub fn pending_for_origin(&self, origin: u32) -> usize {
        self.requests
            .iter()
            .filter(|(_, e)| e.request.origin == origin)
            .count()
    }

    /// Returns the live request entries, oldest first.
    pub fn requests(&self) -> impl Iterator<Item = &RequestEntry> + '_ {
        self.requests.iter().map(|(_, e)| e)
    }

    /// Returns the live entry for request `id`.
    pub fn request(&self, id: u64) -> Option<&RequestEntry> {
        self.requests().find(|e| e.request.id == id)
    }

    /// Returns `true` if the request pool is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.requests.is_full()
    }

    /// Returns the next DRAM cycle to run.
    #[inline]
    pub fn dram_clock(&self) -> u64 {
        self.clock.dram_clock()
    }

    /// Returns the counters.
    #[inline]
    pub fn stats(&self) -> &MemoryCounter {
        &self.stats
    }

    /// Returns the address mapper.
    #[inline]
    pub fn mapper(&self) -> &AddressMapper {
        &self.mapper
    }

    /// Returns the derived geometry and timing.
    #[inline]
    pub fn dram_config(&self) -> &DramConfig {
        &self.dram
    }

    /// Returns the scheduler of channel `index`.
    #[inline]
    pub fn channel(&self, index: u32) -> &ChannelController {
        &self.channels[index as usize]
    }

    /// Returns the number of channels.
    #[inline]
    pub fn channel_count(&self) -> u32 {
        self.channels.len() as u32
    }

    /// Returns the effective configuration as a flat key/value map.
    pub fn dump_configuration(&self) -> Value {
        let d = &self.dram;
        let c = &self.config.controller;
        let a = &self.config.asym;
        json!({
            "device": self.config.memory.device,
            "ram_size": self.config.memory.ram_size,
            "host_freq_hz": self.config.memory.host_freq_hz,
            "tck_ps": d.tck_ps,
            "channels": d.channel_count,
            "ranks": d.rank_count,
            "banks": d.bank_count,
            "rows": d.row_count,
            "columns": d.column_count,
            "clusters": d.cluster_count,
            "groups": d.group_count,
            "indices": d.index_count,
            "max_row_hits": c.max_row_hits,
            "max_row_idle": c.max_row_idle,
            "request_queue_size": c.request_queue_size,
            "transaction_queue_size": c.transaction_queue_size,
            "command_queue_size": c.command_queue_size,
            "max_pending_lookups": c.max_pending_lookups,
            "det_threshold": a.det_threshold,
            "det_cache_size": a.det_cache_size,
            "map_cache_size": a.map_cache_size,
            "map_on_chip": a.map_on_chip,
            "mat_ratio": a.mat_ratio,
            "mat_group": a.mat_group,
            "mat_hash": a.mat_hash,
            "victim_policy": a.victim_policy,
            "refresh_interval": d.rank_timing.refresh_interval,
            "refresh_latency": d.rank_timing.refresh_latency,
            "slow_act_to_read": d.bank_timing(false).act_to_read,
            "fast_act_to_read": d.bank_timing(true).act_to_read,
            "slow_pre_to_act": d.bank_timing(false).pre_to_act,
            "fast_pre_to_act": d.bank_timing(true).pre_to_act,
            "mig_latency": d.bank_timing(false).mig_latency,
        })
    }
}
