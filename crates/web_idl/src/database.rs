//! The IDL database: every definition the frontend produced, looked up by
//! identifier and iterated in sorted order.

use serde::Deserialize;

use crate::definitions::{
    AsyncIterator, CallbackFunction, CallbackInterface, Dictionary, Enumeration, Interface,
    Namespace, ObservableArray, SyncIterator, Typedef, Union,
};

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("no definition named `{0}` in the IDL database")]
    UnknownIdentifier(String),
}

/// The pre-parsed IDL database.
///
/// Definition lists are kept sorted by identifier at construction so that
/// iteration order never depends on input order; generated output iterates
/// these lists directly.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Database {
    interfaces: Vec<Interface>,
    namespaces: Vec<Namespace>,
    dictionaries: Vec<Dictionary>,
    enumerations: Vec<Enumeration>,
    callback_functions: Vec<CallbackFunction>,
    callback_interfaces: Vec<CallbackInterface>,
    typedefs: Vec<Typedef>,
    unions: Vec<Union>,
    observable_arrays: Vec<ObservableArray>,
    sync_iterators: Vec<SyncIterator>,
    async_iterators: Vec<AsyncIterator>,
}

macro_rules! accessors {
    ($list:ident, $find:ident, $ty:ty) => {
        pub fn $list(&self) -> &[$ty] {
            &self.$list
        }

        pub fn $find(&self, identifier: &str) -> Option<&$ty> {
            self.$list
                .binary_search_by(|d| d.identifier.as_str().cmp(identifier))
                .ok()
                .map(|i| &self.$list[i])
        }
    };
}

impl Database {
    accessors!(interfaces, find_interface, Interface);
    accessors!(namespaces, find_namespace, Namespace);
    accessors!(dictionaries, find_dictionary, Dictionary);
    accessors!(enumerations, find_enumeration, Enumeration);
    accessors!(callback_functions, find_callback_function, CallbackFunction);
    accessors!(callback_interfaces, find_callback_interface, CallbackInterface);
    accessors!(typedefs, find_typedef, Typedef);
    accessors!(unions, find_union, Union);
    accessors!(observable_arrays, find_observable_array, ObservableArray);
    accessors!(sync_iterators, find_sync_iterator, SyncIterator);
    accessors!(async_iterators, find_async_iterator, AsyncIterator);

    /// Sort every definition list by identifier. Must be called after
    /// loading or mutating; lookups assume sorted lists.
    pub fn normalize(&mut self) {
        self.interfaces.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.namespaces.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.dictionaries.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.enumerations.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.callback_functions.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.callback_interfaces.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.typedefs.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.unions.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.observable_arrays.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.sync_iterators.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.async_iterators.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    }

    pub fn add_interface(&mut self, interface: Interface) {
        self.interfaces.push(interface);
        self.normalize();
    }

    pub fn add_namespace(&mut self, namespace: Namespace) {
        self.namespaces.push(namespace);
        self.normalize();
    }

    pub fn add_dictionary(&mut self, dictionary: Dictionary) {
        self.dictionaries.push(dictionary);
        self.normalize();
    }

    pub fn add_enumeration(&mut self, enumeration: Enumeration) {
        self.enumerations.push(enumeration);
        self.normalize();
    }

    pub fn add_callback_function(&mut self, callback_function: CallbackFunction) {
        self.callback_functions.push(callback_function);
        self.normalize();
    }

    pub fn add_callback_interface(&mut self, callback_interface: CallbackInterface) {
        self.callback_interfaces.push(callback_interface);
        self.normalize();
    }

    pub fn add_typedef(&mut self, typedef: Typedef) {
        self.typedefs.push(typedef);
        self.normalize();
    }

    pub fn add_union(&mut self, union: Union) {
        self.unions.push(union);
        self.normalize();
    }

    pub fn add_observable_array(&mut self, observable_array: ObservableArray) {
        self.observable_arrays.push(observable_array);
        self.normalize();
    }

    pub fn add_sync_iterator(&mut self, sync_iterator: SyncIterator) {
        self.sync_iterators.push(sync_iterator);
        self.normalize();
    }

    pub fn add_async_iterator(&mut self, async_iterator: AsyncIterator) {
        self.async_iterators.push(async_iterator);
        self.normalize();
    }

    /// Interfaces derived (transitively) from `identifier`, sorted
    /// most-derived first, then by identifier. Includes the interface
    /// itself last among equals of its depth.
    pub fn subclasses_most_derived_first(&self, identifier: &str) -> Vec<&Interface> {
        let mut subclasses: Vec<&Interface> = self
            .interfaces
            .iter()
            .filter(|i| i.identifier == identifier || i.does_inherit_from(self, identifier))
            .collect();
        subclasses.sort_by(|a, b| {
            b.inheritance_depth(self)
                .cmp(&a.inheritance_depth(self))
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        subclasses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::DebugInfo;
    use crate::{ExtendedAttributes, Exposure};

    fn interface(identifier: &str, inherited: Option<&str>) -> Interface {
        Interface {
            identifier: identifier.to_string(),
            inherited: inherited.map(str::to_string),
            is_mixin: false,
            attributes: vec![],
            constants: vec![],
            constructor_groups: vec![],
            legacy_factory_function_groups: vec![],
            operation_groups: vec![],
            stringifier: None,
            indexed_and_named_properties: None,
            iterable: None,
            maplike: None,
            setlike: None,
            async_iterable: None,
            exposed_constructs: vec![],
            legacy_window_aliases: vec![],
            ext_attrs: ExtendedAttributes::new(),
            exposure: Exposure::default(),
            code_generator_info: Default::default(),
            debug_info: DebugInfo::default(),
        }
    }

    #[test]
    fn lookup_after_unsorted_insertion() {
        let mut db = Database::default();
        db.add_interface(interface("Zeta", None));
        db.add_interface(interface("Alpha", None));
        assert!(db.find_interface("Alpha").is_some());
        assert!(db.find_interface("Zeta").is_some());
        assert!(db.find_interface("Missing").is_none());
    }

    #[test]
    fn subclasses_sorted_most_derived_first() {
        let mut db = Database::default();
        db.add_interface(interface("EventTarget", None));
        db.add_interface(interface("Node", Some("EventTarget")));
        db.add_interface(interface("Element", Some("Node")));
        let order: Vec<&str> = db
            .subclasses_most_derived_first("EventTarget")
            .iter()
            .map(|i| i.identifier.as_str())
            .collect();
        assert_eq!(order, ["Element", "Node", "EventTarget"]);
    }

    #[test]
    fn deserializes_from_json() {
        let json = r#"{
            "enumerations": [
                {"identifier": "Mode", "values": ["open", "closed"]}
            ]
        }"#;
        let mut db: Database = serde_json::from_str(json).unwrap();
        db.normalize();
        assert_eq!(db.find_enumeration("Mode").unwrap().values, ["open", "closed"]);
    }
}
