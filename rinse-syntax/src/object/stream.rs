//! Streams.

use crate::filter::{self, Filter, FilterError};
use crate::object::dict::keys::{
    DECODE_PARMS, DECODE_PARMS_ABBREVIATION, DL, FILTER, FILTER_ABBREVIATION, FLATE_DECODE,
    LENGTH,
};
use crate::object::{Dict, Name, Object};

/// A PDF stream: a dictionary together with its (possibly encoded) payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Stream {
    /// The stream dictionary.
    pub dict: Dict,
    /// The raw payload, encoded with the filters named in the dictionary.
    pub data: Vec<u8>,
}

impl Stream {
    /// Create a new stream.
    pub fn new(dict: Dict, data: Vec<u8>) -> Self {
        Self { dict, data }
    }

    /// Returns the names of the filters applied to the payload, outermost first.
    pub fn filter_names(&self) -> Vec<Name> {
        match self
            .dict
            .get(FILTER)
            .or_else(|| self.dict.get(FILTER_ABBREVIATION))
        {
            Some(Object::Name(n)) => vec![n.clone()],
            Some(Object::Array(a)) => a.iter().filter_map(|o| o.as_name().cloned()).collect(),
            _ => vec![],
        }
    }

    /// Returns the decode parameters, aligned with [`Stream::filter_names`].
    pub fn decode_params(&self) -> Vec<Option<Dict>> {
        let count = self.filter_names().len();
        let params = self
            .dict
            .get(DECODE_PARMS)
            .or_else(|| self.dict.get(DECODE_PARMS_ABBREVIATION));

        let mut out = match params {
            Some(Object::Dict(d)) => vec![Some(d.clone())],
            Some(Object::Array(a)) => a.iter().map(|o| o.as_dict().cloned()).collect(),
            _ => vec![],
        };

        out.resize(count, None);
        out
    }

    /// Whether the payload is encoded with at least one filter.
    pub fn is_filtered(&self) -> bool {
        !self.filter_names().is_empty()
    }

    /// Decode the complete filter chain.
    pub fn decoded(&self) -> Result<Vec<u8>, FilterError> {
        let names = self.filter_names();
        let params = self.decode_params();
        let mut data = self.data.clone();

        for (name, params) in names.iter().zip(params.iter()) {
            let filter = Filter::from_name(name)?;
            data = filter.decode(&data, params.as_ref())?;
        }

        Ok(data)
    }

    /// Replace the filter chain and its parameters.
    pub fn set_filters(&mut self, filters: Vec<Name>, params: Vec<Option<Dict>>) {
        self.clear_filters();

        match filters.len() {
            0 => {}
            1 => {
                self.dict.insert(FILTER, filters[0].clone());
            }
            _ => {
                let arr: Vec<Object> = filters.into_iter().map(Object::Name).collect();
                self.dict.insert(FILTER, arr);
            }
        }

        if params.iter().any(Option::is_some) {
            let value = if params.len() == 1 {
                params.into_iter().flatten().next().map(Object::Dict)
            } else {
                Some(Object::Array(
                    params
                        .into_iter()
                        .map(|p| p.map(Object::Dict).unwrap_or(Object::Null))
                        .collect(),
                ))
            };

            if let Some(value) = value {
                self.dict.insert(DECODE_PARMS, value);
            }
        }
    }

    /// Replace the payload with unfiltered data and remove all filter entries.
    pub fn set_unfiltered(&mut self, data: Vec<u8>) {
        self.clear_filters();
        self.data = data;
    }

    fn clear_filters(&mut self) {
        for key in [
            FILTER,
            FILTER_ABBREVIATION,
            DECODE_PARMS,
            DECODE_PARMS_ABBREVIATION,
            DL,
        ] {
            self.dict.remove(key);
        }
    }

    /// Set the `Length` entry to the length of the payload.
    pub fn update_length(&mut self) {
        self.dict.insert(LENGTH, self.data.len() as i64);
    }

    /// Encode the payload with Flate. The stream must not have any filters yet.
    pub fn compress(&mut self) {
        debug_assert!(!self.is_filtered());
        self.data = filter::flate::encode(&self.data);
        self.dict.insert(FILTER, Name::new(FLATE_DECODE));
    }
}

#[cfg(test)]
mod tests {
    use crate::object::dict::keys::{ASCII_HEX_DECODE, FILTER, FLATE_DECODE};
    use crate::object::{Dict, Name, Object, Stream};

    #[test]
    fn compress_then_decode() {
        let mut stream = Stream::new(Dict::new(), b"0 0 m 10 10 l S".to_vec());
        stream.compress();

        assert_eq!(stream.filter_names(), vec![Name::new(FLATE_DECODE)]);
        assert_eq!(stream.decoded().unwrap(), b"0 0 m 10 10 l S");
    }

    #[test]
    fn filter_chain_with_params() {
        let mut stream = Stream::new(Dict::new(), vec![]);
        stream.set_filters(
            vec![Name::new(ASCII_HEX_DECODE), Name::new(FLATE_DECODE)],
            vec![None, Some(Dict::new())],
        );

        assert!(matches!(stream.dict.get(FILTER), Some(Object::Array(a)) if a.len() == 2));
        assert_eq!(stream.decode_params(), vec![None, Some(Dict::new())]);
    }
}
