//! Interception backend.
//!
//! Every access on a wrapper is routed through a trap table chosen once, at
//! wrap time, from the wrapper's variant. The four tables are statics built
//! from the same generic traps, monomorphized per `(readonly, shallow)`
//! pair, so a trap never branches on the variant at runtime.

use super::handlers::{self, ObjectHandler};
use super::wrapper::Reactive;
use super::{Access, Backend, Variant};
use crate::value::{PropKey, Value};

type GetTrap = fn(&Reactive, &PropKey) -> Value;
type SetTrap = fn(&Reactive, PropKey, Value) -> bool;
type DeleteTrap = fn(&Reactive, &PropKey) -> bool;
type HasTrap = fn(&Reactive, &PropKey) -> bool;
type OwnKeysTrap = fn(&Reactive) -> Vec<PropKey>;

/// The traps of one variant.
pub(crate) struct TrapTable {
    variant: Variant,
    get: GetTrap,
    set: SetTrap,
    delete_property: DeleteTrap,
    has: HasTrap,
    own_keys: OwnKeysTrap,
}

const fn access<const READONLY: bool, const SHALLOW: bool>() -> Access {
    Access {
        readonly: READONLY,
        shallow: SHALLOW,
    }
}

fn get_trap<const READONLY: bool, const SHALLOW: bool>(w: &Reactive, key: &PropKey) -> Value {
    handlers::get(w, key, access::<READONLY, SHALLOW>())
}

fn set_trap<const READONLY: bool, const SHALLOW: bool>(
    w: &Reactive,
    key: PropKey,
    value: Value,
) -> bool {
    handlers::set(w, key, value, access::<READONLY, SHALLOW>())
}

fn delete_trap<const READONLY: bool, const SHALLOW: bool>(w: &Reactive, key: &PropKey) -> bool {
    handlers::delete_property(w, key, access::<READONLY, SHALLOW>())
}

fn has_trap<const READONLY: bool, const SHALLOW: bool>(w: &Reactive, key: &PropKey) -> bool {
    handlers::has(w, key, access::<READONLY, SHALLOW>())
}

fn own_keys_trap<const READONLY: bool, const SHALLOW: bool>(w: &Reactive) -> Vec<PropKey> {
    handlers::own_keys(w, access::<READONLY, SHALLOW>())
}

const fn table<const READONLY: bool, const SHALLOW: bool>(variant: Variant) -> TrapTable {
    TrapTable {
        variant,
        get: get_trap::<READONLY, SHALLOW>,
        set: set_trap::<READONLY, SHALLOW>,
        delete_property: delete_trap::<READONLY, SHALLOW>,
        has: has_trap::<READONLY, SHALLOW>,
        own_keys: own_keys_trap::<READONLY, SHALLOW>,
    }
}

static MUTABLE: TrapTable = table::<false, false>(Variant::Reactive);
static SHALLOW_MUTABLE: TrapTable = table::<false, true>(Variant::ShallowReactive);
static READONLY: TrapTable = table::<true, false>(Variant::Readonly);
static SHALLOW_READONLY: TrapTable = table::<true, true>(Variant::ShallowReadonly);

/// The trap table for `variant`.
pub(crate) fn handlers_for(variant: Variant) -> &'static TrapTable {
    match variant {
        Variant::Reactive => &MUTABLE,
        Variant::ShallowReactive => &SHALLOW_MUTABLE,
        Variant::Readonly => &READONLY,
        Variant::ShallowReadonly => &SHALLOW_READONLY,
    }
}

impl ObjectHandler for TrapTable {
    fn backend(&self) -> Backend {
        Backend::Interception
    }

    fn get(&self, wrapper: &Reactive, key: &PropKey) -> Value {
        (self.get)(wrapper, key)
    }

    fn set(&self, wrapper: &Reactive, key: PropKey, value: Value) -> bool {
        (self.set)(wrapper, key, value)
    }

    fn delete_property(&self, wrapper: &Reactive, key: &PropKey) -> bool {
        (self.delete_property)(wrapper, key)
    }

    fn has(&self, wrapper: &Reactive, key: &PropKey) -> bool {
        (self.has)(wrapper, key)
    }

    fn own_keys(&self, wrapper: &Reactive) -> Vec<PropKey> {
        (self.own_keys)(wrapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_table_per_variant() {
        for variant in [
            Variant::Reactive,
            Variant::ShallowReactive,
            Variant::Readonly,
            Variant::ShallowReadonly,
        ] {
            let table = handlers_for(variant);
            assert_eq!(table.variant, variant);
            assert_eq!(table.backend(), Backend::Interception);
        }
        assert!(std::ptr::eq(
            handlers_for(Variant::Reactive),
            handlers_for(Variant::Reactive)
        ));
    }
}
