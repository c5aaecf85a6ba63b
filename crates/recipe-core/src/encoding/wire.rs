//! Formato wire de una receta.
//!
//! ```text
//! message  := MAGIC(4) version(u8) name(str) count(u32) action*
//! action   := tag(u8) flags(u8) n_inputs(u32) slot* [patch]
//! slot     := 0x00 len(u32) bytes | 0x01 step(u32) field(u32)
//! patch    := slot_index(u32) amount(slot) n_offsets(u32) offset(u32)*
//! str      := len(u32) utf8
//! ```
//!
//! Enteros big-endian. `flags` bit 0 = registra output, bit 1 = tiene patch.
//! El template del patch no se repite: es el literal del slot indicado.
//! Las referencias viajan como `(step, field)`; se resuelven en ejecución.

use crate::constants::{WIRE_MAGIC, WIRE_VERSION};
use crate::errors::ComposerError;
use crate::model::{Action, ActionKind, PatchBinding, Recipe, Slot};
use crate::patch::PatchSpec;

const SLOT_LITERAL: u8 = 0x00;
const SLOT_REFERENCE: u8 = 0x01;
const FLAG_OUTPUT: u8 = 0b01;
const FLAG_PATCH: u8 = 0b10;

/// Serializa la receta. Falla con `InvalidReference` (o bracket mal formado)
/// antes de escribir un solo byte.
pub fn encode(recipe: &Recipe) -> Result<Vec<u8>, ComposerError> {
    recipe.validate()?;
    let mut w = Writer::default();
    w.raw(WIRE_MAGIC);
    w.u8(WIRE_VERSION);
    w.bytes(recipe.name().as_bytes())?;
    w.len(recipe.len())?;
    for action in recipe.actions() {
        write_action(&mut w, action)?;
    }
    Ok(w.buf)
}

/// Inversa exacta de `encode`; re-valida la receta resultante.
pub fn decode(message: &[u8]) -> Result<Recipe, ComposerError> {
    let mut r = Reader::new(message);
    if r.take(WIRE_MAGIC.len())? != WIRE_MAGIC {
        return Err(malformed("bad magic"));
    }
    let version = r.u8()?;
    if version != WIRE_VERSION {
        return Err(malformed(format!("unsupported version {version}")));
    }
    let name = String::from_utf8(r.bytes()?.to_vec()).map_err(|_| malformed("recipe name is not utf-8"))?;
    let count = r.len()?;
    let mut actions = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        actions.push(read_action(&mut r)?);
    }
    if !r.is_empty() {
        return Err(malformed(format!("{} trailing bytes", r.remaining())));
    }
    let recipe = Recipe::new(name, actions);
    recipe.validate()?;
    Ok(recipe)
}

fn write_action(w: &mut Writer, action: &Action) -> Result<(), ComposerError> {
    let mut flags = 0u8;
    if action.produces_output() {
        flags |= FLAG_OUTPUT;
    }
    if action.patch().is_some() {
        flags |= FLAG_PATCH;
    }
    w.u8(action.kind().tag());
    w.u8(flags);
    w.len(action.inputs().len())?;
    for slot in action.inputs() {
        write_slot(w, slot)?;
    }
    if let Some(binding) = action.patch() {
        w.len(binding.slot)?;
        write_slot(w, &binding.amount)?;
        w.len(binding.spec.amount_offsets().len())?;
        for &offset in binding.spec.amount_offsets() {
            w.len(offset)?;
        }
    }
    Ok(())
}

fn read_action(r: &mut Reader<'_>) -> Result<Action, ComposerError> {
    let kind = ActionKind::from_tag(r.u8()?)?;
    let flags = r.u8()?;
    if flags & !(FLAG_OUTPUT | FLAG_PATCH) != 0 {
        return Err(malformed(format!("unknown action flags 0x{flags:02x}")));
    }
    let n_inputs = r.len()?;
    let mut inputs = Vec::with_capacity(n_inputs.min(16));
    for _ in 0..n_inputs {
        inputs.push(read_slot(r)?);
    }
    let patch = if flags & FLAG_PATCH != 0 {
        let slot = r.len()?;
        let amount = read_slot(r)?;
        let n_offsets = r.len()?;
        let mut offsets = Vec::with_capacity(n_offsets.min(64));
        for _ in 0..n_offsets {
            offsets.push(r.len()?);
        }
        let template = inputs.get(slot)
                             .and_then(Slot::literal)
                             .ok_or_else(|| malformed(format!("patch slot {slot} is not a literal input")))?
                             .to_vec();
        Some(PatchBinding { slot,
                            spec: PatchSpec::from_offsets(template, offsets)?,
                            amount })
    } else {
        None
    };
    Action::from_parts(kind, inputs, flags & FLAG_OUTPUT != 0, patch)
}

fn write_slot(w: &mut Writer, slot: &Slot) -> Result<(), ComposerError> {
    match slot {
        Slot::Literal(bytes) => {
            w.u8(SLOT_LITERAL);
            w.bytes(bytes)
        }
        Slot::Reference { step, field } => {
            w.u8(SLOT_REFERENCE);
            w.len(*step)?;
            w.len(*field)
        }
    }
}

fn read_slot(r: &mut Reader<'_>) -> Result<Slot, ComposerError> {
    match r.u8()? {
        SLOT_LITERAL => Ok(Slot::Literal(r.bytes()?.to_vec())),
        SLOT_REFERENCE => {
            let step = r.len()?;
            let field = r.len()?;
            Ok(Slot::Reference { step, field })
        }
        other => Err(malformed(format!("unknown slot tag 0x{other:02x}"))),
    }
}

fn malformed(reason: impl Into<String>) -> ComposerError {
    ComposerError::MalformedWire(reason.into())
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn len(&mut self, v: usize) -> Result<(), ComposerError> {
        let v = u32::try_from(v).map_err(|_| malformed(format!("value {v} does not fit in u32")))?;
        self.raw(&v.to_be_bytes());
        Ok(())
    }

    fn bytes(&mut self, bytes: &[u8]) -> Result<(), ComposerError> {
        self.len(bytes.len())?;
        self.raw(bytes);
        Ok(())
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ComposerError> {
        if n > self.remaining() {
            return Err(malformed(format!("truncated message: need {n} bytes at offset {}", self.pos)));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ComposerError> {
        Ok(self.take(1)?[0])
    }

    fn len(&mut self) -> Result<usize, ComposerError> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize)
    }

    fn bytes(&mut self) -> Result<&'a [u8], ComposerError> {
        let n = self.len()?;
        self.take(n)
    }
}
