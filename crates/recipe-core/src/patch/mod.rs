//! Patcher de amounts en calldata externa.
//!
//! Un servicio de quotes devuelve un blob opaco (`template`) construido sobre
//! un amount que era cierto al momento del quote. `PatchSpec::derive` localiza
//! todas las posiciones donde aparece la codificación de 32 bytes de ese
//! amount; `PatchSpec::apply` produce una copia nueva con el amount real
//! escrito en todas ellas. El template nunca se muta.

pub mod quote;

use alloy_primitives::{Bytes, U256};
use alloy_sol_types::SolValue;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::WORD_SIZE;
use crate::errors::ComposerError;
use crate::model::slot::{decode_amount, encode_amount};

pub use quote::{Quote, QuoteService};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PatchSpecRepr")]
pub struct PatchSpec {
    template: Vec<u8>,
    amount_offsets: Vec<usize>,
}

#[derive(Deserialize)]
struct PatchSpecRepr {
    template: Vec<u8>,
    amount_offsets: Vec<usize>,
}

impl TryFrom<PatchSpecRepr> for PatchSpec {
    type Error = ComposerError;

    fn try_from(repr: PatchSpecRepr) -> Result<Self, Self::Error> {
        Self::from_offsets(repr.template, repr.amount_offsets)
    }
}

impl PatchSpec {
    /// Deriva los offsets de `quoted_amount` dentro de `template`.
    ///
    /// Falla con `AmountNotFoundInTemplate` si no hay ninguna ocurrencia: un
    /// swap con el amount viejo sin parchear no es aceptable.
    pub fn derive(template: &[u8], quoted_amount: U256) -> Result<Self, ComposerError> {
        let needle = encode_amount(quoted_amount);
        let amount_offsets = find_offsets(template, &needle);
        if amount_offsets.is_empty() {
            return Err(ComposerError::AmountNotFoundInTemplate { amount: quoted_amount,
                                                                 template_len: template.len() });
        }
        debug!("derived {} amount offset(s) in {}-byte template", amount_offsets.len(), template.len());
        Ok(Self { template: template.to_vec(),
                  amount_offsets })
    }

    /// Reconstruye un spec a partir de offsets ya conocidos (p.ej. al
    /// decodificar un mensaje). Los offsets deben ser crecientes, no
    /// solaparse y caber completos en el template.
    pub fn from_offsets(template: Vec<u8>, amount_offsets: Vec<usize>) -> Result<Self, ComposerError> {
        check_offsets(template.len(), &amount_offsets)?;
        Ok(Self { template,
                  amount_offsets })
    }

    pub fn template(&self) -> &[u8] {
        &self.template
    }

    pub fn amount_offsets(&self) -> &[usize] {
        &self.amount_offsets
    }

    /// Amount escrito en el template en el primer offset (el del quote).
    pub fn quoted_amount(&self) -> U256 {
        self.amount_offsets
            .first()
            .and_then(|&offset| self.template.get(offset..offset + WORD_SIZE))
            .and_then(decode_amount)
            .unwrap_or_default()
    }

    /// Copia el template y sobrescribe cada offset con `runtime_amount`.
    pub fn apply(&self, runtime_amount: U256) -> Vec<u8> {
        let word = encode_amount(runtime_amount);
        let mut out = self.template.clone();
        for &offset in &self.amount_offsets {
            out[offset..offset + WORD_SIZE].copy_from_slice(&word);
        }
        out
    }

    /// Subconjunto de offsets elegido por el caller cuando sabe cuál de las
    /// ocurrencias es el campo de amount real.
    pub fn retain_offsets<F>(&self, mut keep: F) -> Result<Self, ComposerError>
        where F: FnMut(usize) -> bool
    {
        let amount_offsets: Vec<usize> = self.amount_offsets.iter().copied().filter(|o| keep(*o)).collect();
        if amount_offsets.is_empty() {
            return Err(ComposerError::AmountNotFoundInTemplate { amount: self.quoted_amount(),
                                                                 template_len: self.template.len() });
        }
        Ok(Self { template: self.template.clone(),
                  amount_offsets })
    }

    /// Codificación ABI de `(bytes template, uint256[] offsets)` como tupla
    /// dinámica única: el payload que consumen los wrappers de agregadores.
    pub fn wrapper_calldata(&self) -> Vec<u8> {
        let offsets: Vec<U256> = self.amount_offsets.iter().map(|&o| U256::from(o)).collect();
        (Bytes::from(self.template.clone()), offsets).abi_encode()
    }
}

/// Todas las posiciones (bytes, ascendentes) donde `needle` aparece completo.
/// Las coincidencias no se solapan: la búsqueda continúa tras cada match.
pub fn find_offsets(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut offsets = Vec::new();
    if needle.is_empty() || haystack.len() < needle.len() {
        return offsets;
    }
    let mut pos = 0;
    while pos + needle.len() <= haystack.len() {
        if &haystack[pos..pos + needle.len()] == needle {
            offsets.push(pos);
            pos += needle.len();
        } else {
            pos += 1;
        }
    }
    offsets
}

fn check_offsets(template_len: usize, offsets: &[usize]) -> Result<(), ComposerError> {
    if offsets.is_empty() {
        return Err(ComposerError::MalformedWire("patch without offsets".into()));
    }
    let mut next_free = 0usize;
    for &offset in offsets {
        let end = offset.checked_add(WORD_SIZE)
                        .ok_or_else(|| ComposerError::MalformedWire(format!("offset {offset} overflows")))?;
        if offset < next_free || end > template_len {
            return Err(ComposerError::MalformedWire(format!("patch offset {offset} out of order or out of bounds")));
        }
        next_free = end;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_with(amount: U256, prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
        let mut v = prefix.to_vec();
        v.extend_from_slice(&encode_amount(amount));
        v.extend_from_slice(suffix);
        v
    }

    #[test]
    fn derive_finds_unaligned_offset() {
        let amount = U256::from(1_000_000u64);
        let template = blob_with(amount, &[0xde, 0xad, 0xbe], &[0xff; 5]);
        let spec = PatchSpec::derive(&template, amount).unwrap();
        assert_eq!(spec.amount_offsets(), &[3]);
    }

    #[test]
    fn derive_records_every_occurrence() {
        let amount = U256::from(42u64);
        let mut template = blob_with(amount, &[0x11; 4], &[0x22; 7]);
        template.extend_from_slice(&encode_amount(amount));
        let spec = PatchSpec::derive(&template, amount).unwrap();
        assert_eq!(spec.amount_offsets(), &[4, 43]);

        let patched = spec.apply(U256::from(77u64));
        assert_eq!(&patched[4..36], &encode_amount(U256::from(77u64)));
        assert_eq!(&patched[43..75], &encode_amount(U256::from(77u64)));
        assert_eq!(&patched[..4], &template[..4]);
        assert_eq!(&patched[36..43], &template[36..43]);
    }

    #[test]
    fn derive_fails_when_amount_absent() {
        let template = vec![0u8; 64];
        let err = PatchSpec::derive(&template, U256::from(5u64)).unwrap_err();
        assert_eq!(err,
                   ComposerError::AmountNotFoundInTemplate { amount: U256::from(5u64),
                                                             template_len: 64 });
    }

    #[test]
    fn apply_never_touches_template() {
        let amount = U256::from(9u64);
        let template = blob_with(amount, &[], &[]);
        let spec = PatchSpec::derive(&template, amount).unwrap();
        let a = spec.apply(U256::from(1u64));
        let b = spec.apply(U256::from(2u64));
        assert_ne!(a, b);
        assert_eq!(spec.template(), template.as_slice());
    }

    #[test]
    fn retain_offsets_can_disambiguate() {
        let amount = U256::from(3u64);
        let mut template = blob_with(amount, &[], &[]);
        template.extend_from_slice(&encode_amount(amount));
        let spec = PatchSpec::derive(&template, amount).unwrap();
        let first_only = spec.retain_offsets(|o| o == 0).unwrap();
        assert_eq!(first_only.amount_offsets(), &[0]);
        assert_eq!(spec.retain_offsets(|_| false),
                   Err(ComposerError::AmountNotFoundInTemplate { amount,
                                                                 template_len: 64 }));
    }

    #[test]
    fn overlapping_matches_resume_after_full_word() {
        // 65 bytes en cero: el word cero aparece en 0..=33, pero sólo se
        // toman 0 y 32; el byte final no alcanza para otro match.
        let template = vec![0u8; 65];
        let spec = PatchSpec::derive(&template, U256::ZERO).unwrap();
        assert_eq!(spec.amount_offsets(), &[0, 32]);
        assert_eq!(spec.quoted_amount(), U256::ZERO);

        let patched = spec.apply(U256::from(7u64));
        assert_eq!(&patched[0..32], &encode_amount(U256::from(7u64)));
        assert_eq!(&patched[32..64], &encode_amount(U256::from(7u64)));
        assert_eq!(patched[64], 0);
        assert_eq!(patched.len(), 65);

        assert_eq!(find_offsets(&[0u8; 33], &[0u8; 32]), vec![0]);
    }

    #[test]
    fn deserialization_checks_offsets() {
        let err = serde_json::from_str::<PatchSpec>(r#"{"template":[0,0,0],"amount_offsets":[0]}"#).unwrap_err();
        assert!(err.to_string().contains("out of bounds"), "{err}");
        let ok: PatchSpec = serde_json::from_str(&format!(r#"{{"template":{:?},"amount_offsets":[0]}}"#, vec![0u8; 32])).unwrap();
        assert_eq!(ok.amount_offsets(), &[0]);
    }

    #[test]
    fn from_offsets_rejects_overlap_and_overflow() {
        assert!(PatchSpec::from_offsets(vec![0; 64], vec![0, 16]).is_err());
        assert!(PatchSpec::from_offsets(vec![0; 64], vec![40]).is_err());
        assert!(PatchSpec::from_offsets(vec![0; 64], vec![]).is_err());
        assert!(PatchSpec::from_offsets(vec![0; 64], vec![0, 32]).is_ok());
    }

    #[test]
    fn wrapper_calldata_layout() {
        let amount = U256::from(7u64);
        let template = blob_with(amount, &[0xaa], &[]);
        let spec = PatchSpec::derive(&template, amount).unwrap();
        let data = spec.wrapper_calldata();
        // head(1) + tuple head(2) + bytes len(1) + bytes padded(2) + array len(1) + offsets(1)
        assert_eq!(data.len(), 8 * WORD_SIZE);
        assert_eq!(U256::from_be_slice(&data[0..32]), U256::from(32u64));
        assert_eq!(U256::from_be_slice(&data[32..64]), U256::from(64u64));
        assert_eq!(U256::from_be_slice(&data[64..96]), U256::from(160u64));
        assert_eq!(U256::from_be_slice(&data[96..128]), U256::from(33u64));
        assert_eq!(&data[128..161], template.as_slice());
        assert_eq!(U256::from_be_slice(&data[192..224]), U256::from(1u64));
        assert_eq!(U256::from_be_slice(&data[224..256]), U256::from(1u64));
    }
}
