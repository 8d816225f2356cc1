//! Hand-written schema types shared by the unit tests.

use std::marker::PhantomData;

use setthings_schema::{FieldPath, FlatMap, Property, Selector, Settings};

pub(crate) fn map(pairs: &[(&str, &str)]) -> FlatMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Network {
    pub careers_host: String,
    pub port: u16,
}

pub(crate) struct NetworkFields<R> {
    path: FieldPath,
    _root: PhantomData<fn() -> R>,
}

impl<R: 'static> NetworkFields<R> {
    pub fn careers_host(&self) -> Selector<R, String> {
        Selector::new(self.path.join("CareersHost"))
    }

    pub fn port(&self) -> Selector<R, u16> {
        Selector::new(self.path.join("Port"))
    }
}

impl Settings for Network {
    type Fields<R: 'static> = NetworkFields<R>;

    fn properties() -> Vec<Property<Self>> {
        vec![
            Property::<Self>::leaf::<String>(
                "CareersHost",
                None,
                Some("careers.example.com"),
                |s| &s.careers_host,
                |s| &mut s.careers_host,
            ),
            Property::<Self>::leaf::<u16>("Port", None, None, |s| &s.port, |s| &mut s.port),
        ]
    }

    fn fields_at<R: 'static>(path: FieldPath) -> Self::Fields<R> {
        NetworkFields {
            path,
            _root: PhantomData,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Service {
    pub name: String,
    pub enabled: bool,
    pub network: Network,
}

pub(crate) struct ServiceFields<R> {
    path: FieldPath,
    _root: PhantomData<fn() -> R>,
}

impl<R: 'static> ServiceFields<R> {
    pub fn name(&self) -> Selector<R, String> {
        Selector::new(self.path.join("Name"))
    }

    pub fn enabled(&self) -> Selector<R, bool> {
        Selector::new(self.path.join("Enabled"))
    }

    pub fn network(&self) -> NetworkFields<R> {
        Network::fields_at::<R>(self.path.join("Network"))
    }
}

impl Settings for Service {
    type Fields<R: 'static> = ServiceFields<R>;

    fn properties() -> Vec<Property<Self>> {
        vec![
            Property::<Self>::leaf::<String>("Name", None, None, |s| &s.name, |s| &mut s.name),
            Property::<Self>::leaf::<bool>(
                "Enabled",
                None,
                Some("true"),
                |s| &s.enabled,
                |s| &mut s.enabled,
            ),
            Property::<Self>::node::<Network>(
                "Network",
                None,
                |s| &s.network,
                |s| &mut s.network,
            ),
        ]
    }

    fn fields_at<R: 'static>(path: FieldPath) -> Self::Fields<R> {
        ServiceFields {
            path,
            _root: PhantomData,
        }
    }
}
