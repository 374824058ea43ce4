//! The slotted heap page: a header bitmap followed by fixed-width tuple
//! slots, all inside one [`PAGE_SIZE`] buffer.

use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};
use crate::{PageId, RecordId, PAGE_SIZE};

/// A decoded heap page.
///
/// On disk the layout is `[header][slot 0][slot 1]…`, where the header is a
/// bitmap with one bit per slot (bit `i` lives in byte `i / 8` at position
/// `i % 8`, least significant bit first) and every slot occupies
/// `desc.byte_len()` bytes whether or not it is in use. The bytes of an empty
/// slot carry no meaning.
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    desc: Arc<TupleDesc>,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirty: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Slots that fit on one page: floor(page bits / (slot bits + 1 header bit)).
    pub fn slots_per_page(desc: &TupleDesc) -> usize {
        (PAGE_SIZE * 8) / (desc.byte_len() * 8 + 1)
    }

    /// Header bytes needed for `num_slots` bitmap bits.
    pub fn header_len(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    /// The byte content of a freshly allocated page: all zeroes.
    pub fn empty_page_data() -> Vec<u8> {
        vec![0; PAGE_SIZE]
    }

    /// Decodes a page from its on-disk bytes. The decoded bytes also become
    /// the page's before-image.
    pub fn parse(pid: PageId, desc: Arc<TupleDesc>, data: &[u8]) -> Result<Self> {
        if data.len() != PAGE_SIZE {
            return Err(DbError::Generic(format!(
                "page {} has {} bytes, expected {}",
                pid,
                data.len(),
                PAGE_SIZE
            )));
        }

        let num_slots = Self::slots_per_page(&desc);
        let header_len = Self::header_len(num_slots);
        let header = data[..header_len].to_vec();
        let slot_len = desc.byte_len();

        let mut tuples = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if header[slot / 8] & (1 << (slot % 8)) == 0 {
                tuples.push(None);
                continue;
            }
            let start = header_len + slot * slot_len;
            let mut offset = start;
            let mut fields = Vec::with_capacity(desc.num_fields());
            for i in 0..desc.num_fields() {
                let ty = desc.field_type(i);
                fields.push(ty.parse(&data[offset..])?);
                offset += ty.byte_len();
            }
            let mut tuple = Tuple::new(desc.clone(), fields)?;
            tuple.set_record_id(Some(RecordId::new(pid, slot)));
            tuples.push(Some(tuple));
        }

        Ok(Self {
            pid,
            desc,
            header,
            tuples,
            dirty: None,
            before_image: data.to_vec(),
        })
    }

    /// A brand-new empty page.
    pub fn new_empty(pid: PageId, desc: Arc<TupleDesc>) -> Self {
        // parse of all-zero bytes cannot fail: every slot bit is clear
        Self::parse(pid, desc, &Self::empty_page_data())
            .expect("empty page data always decodes")
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn num_slots(&self) -> usize {
        self.tuples.len()
    }

    pub fn slot_used(&self, slot: usize) -> bool {
        self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn set_slot(&mut self, slot: usize, used: bool) {
        if used {
            self.header[slot / 8] |= 1 << (slot % 8);
        } else {
            self.header[slot / 8] &= !(1 << (slot % 8));
        }
    }

    pub fn empty_slot_count(&self) -> usize {
        (0..self.num_slots()).filter(|&s| !self.slot_used(s)).count()
    }

    /// Tuples of the used slots, ascending by slot index.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().flatten()
    }

    /// Stores `tuple` in the lowest empty slot and stamps its record id.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<()> {
        if **tuple.desc() != *self.desc {
            return Err(DbError::SchemaMismatch(format!(
                "tuple schema ({}) differs from page schema ({})",
                tuple.desc(),
                self.desc
            )));
        }
        let slot = (0..self.num_slots())
            .find(|&s| !self.slot_used(s))
            .ok_or(DbError::PageFull)?;

        self.set_slot(slot, true);
        tuple.set_record_id(Some(RecordId::new(self.pid, slot)));
        self.tuples[slot] = Some(tuple);
        Ok(())
    }

    /// Clears the slot named by the tuple's record id.
    ///
    /// Fails with [`DbError::NotOnPage`] when the record id names another
    /// page, the slot is already empty, or the stored tuple differs.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(DbError::NotOnPage)?;
        if rid.page_id != self.pid || rid.slot >= self.num_slots() {
            return Err(DbError::NotOnPage);
        }
        let matches = match &self.tuples[rid.slot] {
            Some(stored) => stored.fields() == tuple.fields(),
            None => false,
        };
        if !self.slot_used(rid.slot) || !matches {
            return Err(DbError::NotOnPage);
        }
        self.set_slot(rid.slot, false);
        self.tuples[rid.slot] = None;
        Ok(())
    }

    pub fn mark_dirty(&mut self, dirty: bool, tx: TransactionId) {
        self.dirty = if dirty { Some(tx) } else { None };
    }

    /// The transaction that last dirtied this page, if any.
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirty
    }

    /// Encodes the page into its [`PAGE_SIZE`] on-disk form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAGE_SIZE);
        out.extend_from_slice(&self.header);
        let slot_len = self.desc.byte_len();
        for stored in &self.tuples {
            match stored {
                Some(tuple) => tuple.write_to(&mut out),
                None => out.extend(std::iter::repeat(0u8).take(slot_len)),
            }
        }
        out.resize(PAGE_SIZE, 0);
        out
    }

    /// The page as it looked at transaction start or the last flush.
    pub fn before_image(&self) -> Result<HeapPage> {
        Self::parse(self.pid, self.desc.clone(), &self.before_image)
    }

    pub fn before_image_data(&self) -> &[u8] {
        &self.before_image
    }

    /// Snapshots the current content as the new before-image.
    pub fn set_before_image(&mut self) {
        self.before_image = self.serialize();
    }
}
