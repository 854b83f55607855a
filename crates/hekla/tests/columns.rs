//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

//! Column and builder invariants: lengths, validity masks, slicing, lists,
//! structs, and categorical dictionaries.

use hekla::column::builder::{ColumnBuilder, ListBuilder, PrimBuilder, StrBuilder};
use hekla::column::{ListArray, NULL_CODE};
use hekla::{Column, DataType, Scalar};

// ---------------------------------------------------------------------------
// Length invariants
// ---------------------------------------------------------------------------

#[test]
fn primitive_lengths() {
    let c = Column::from_vec(vec![1i64, 2, 3]).unwrap();
    assert_eq!(c.len(), 3);
    assert_eq!(c.null_count(), 0);
    let c = Column::from_options(&[Some(1.0f64), None, Some(3.0)]).unwrap();
    assert_eq!(c.len(), 3);
    assert_eq!(c.null_count(), 1);
    let arr = c.prim::<f64>().unwrap();
    assert_eq!(arr.validity().unwrap().len(), c.len());
}

#[test]
fn string_offsets_are_len_plus_one() {
    let c = Column::from_strs(&["aa", "b", ""]).unwrap();
    let arr = c.str_array().unwrap();
    assert_eq!(arr.offsets().len(), arr.len() + 1);
    assert_eq!(arr.offsets()[arr.len()] as usize, arr.bytes().len());
}

#[test]
fn empty_and_single_row() {
    for dtype in [DataType::I64, DataType::F64, DataType::Str, DataType::Bool] {
        let empty = Column::empty(&dtype).unwrap();
        assert_eq!(empty.len(), 0);
        assert_eq!(empty.dtype(), dtype);
    }
    let single = Column::from_vec(vec![42i64]).unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(single.get(0), Scalar::I64(42));
}

#[test]
fn all_null_column() {
    let c = Column::from_options::<i64>(&[None, None, None]).unwrap();
    assert_eq!(c.null_count(), 3);
    let sliced = c.slice(1, 2);
    assert_eq!(sliced.null_count(), 2);
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

#[test]
fn prim_builder_appends() {
    let mut b = PrimBuilder::<i64>::new();
    b.append_value(1).unwrap();
    b.append_null().unwrap();
    b.append_slice(&[2, 3]).unwrap();
    let arr = b.finish().unwrap();
    assert_eq!(arr.len(), 4);
    assert_eq!(arr.get(0), Some(1));
    assert_eq!(arr.get(1), None);
    assert_eq!(arr.get(3), Some(3));
}

#[test]
fn str_builder_arena_grows() {
    let mut b = StrBuilder::new();
    for i in 0..1000 {
        b.append_value(&format!("value-{i}")).unwrap();
    }
    b.append_null().unwrap();
    let arr = b.finish().unwrap();
    assert_eq!(arr.len(), 1001);
    assert_eq!(arr.get(0), Some("value-0"));
    assert_eq!(arr.get(999), Some("value-999"));
    assert_eq!(arr.get(1000), None);
}

#[test]
fn builder_from_dtype_round_trips_scalars() {
    let dtype = DataType::Str;
    let mut b = ColumnBuilder::new(&dtype).unwrap();
    b.append_scalar(&Scalar::from("x")).unwrap();
    b.append_scalar(&Scalar::Null).unwrap();
    let col = b.finish().unwrap();
    assert_eq!(col.get(0), Scalar::from("x"));
    assert!(col.get(1).is_null());
}

// ---------------------------------------------------------------------------
// Categorical
// ---------------------------------------------------------------------------

#[test]
fn categorical_shares_dictionary() {
    let c = Column::from_opt_strs(&[Some("x"), Some("y"), None, Some("x")])
        .unwrap()
        .cast(&DataType::Categorical, false)
        .unwrap();
    let Column::Cat(arr) = &c else { panic!() };
    assert_eq!(arr.dict().len(), 2);
    assert_eq!(arr.codes()[2], NULL_CODE);
    // Slicing shares the dictionary.
    let s = arr.slice(2, 2);
    assert!(std::sync::Arc::ptr_eq(arr.dict(), s.dict()));
}

// ---------------------------------------------------------------------------
// Lists and structs
// ---------------------------------------------------------------------------

#[test]
fn list_offsets_and_child() {
    let mut b = ListBuilder::new(&DataType::I64).unwrap();
    b.append_list(&Column::from_vec(vec![1i64, 2]).unwrap()).unwrap();
    b.append_list(&Column::from_vec(Vec::<i64>::new()).unwrap()).unwrap();
    b.append_null().unwrap();
    b.append_list(&Column::from_vec(vec![3i64]).unwrap()).unwrap();
    let arr: ListArray = b.finish().unwrap();
    assert_eq!(arr.len(), 4);
    assert_eq!(arr.offsets(), &[0, 2, 2, 2, 3]);
    assert_eq!(arr.child().len(), 3);
    assert_eq!(arr.list_len(0), 2);
    assert_eq!(arr.list_len(1), 0);
    assert!(arr.list_at(2).is_none());
}

#[test]
fn struct_fields_equal_length() {
    let fields = vec![
        ("a".to_string(), Column::from_vec(vec![1i64, 2]).unwrap()),
        ("b".to_string(), Column::from_strs(&["x", "y"]).unwrap()),
    ];
    let arr = hekla::column::StructArray::new(fields, None).unwrap();
    assert_eq!(arr.len(), 2);
    assert!(arr.field("a").is_some());
    assert!(arr.field("missing").is_none());

    let bad = hekla::column::StructArray::new(
        vec![
            ("a".to_string(), Column::from_vec(vec![1i64]).unwrap()),
            ("b".to_string(), Column::from_vec(vec![1i64, 2]).unwrap()),
        ],
        None,
    );
    assert!(bad.is_err());
}

// ---------------------------------------------------------------------------
// Gather / filter round trip
// ---------------------------------------------------------------------------

#[test]
fn filter_gather_round_trip() {
    let c = Column::from_vec(vec![10i64, 20, 30, 40, 50]).unwrap();
    let mask = [1u8, 0, 1, 0, 1];
    let filtered = c.filter(&mask).unwrap();
    let arr = filtered.prim::<i64>().unwrap();
    assert_eq!(arr.values(), &[10, 30, 50]);

    // gather(filter_indices(mask)) equals mask selection.
    let indices: Vec<u32> = mask
        .iter()
        .enumerate()
        .filter(|(_, &m)| m != 0)
        .map(|(i, _)| i as u32)
        .collect();
    let gathered = c.gather(&indices).unwrap();
    assert!(gathered.eq_rows(0, &filtered, 0));
    assert!(gathered.eq_rows(1, &filtered, 1));
    assert!(gathered.eq_rows(2, &filtered, 2));
}

// ---------------------------------------------------------------------------
// Typed record ingestion
// ---------------------------------------------------------------------------

#[test]
fn frame_from_structs() {
    struct Trade {
        symbol: &'static str,
        qty: i64,
        price: Option<f64>,
    }
    impl hekla::Record for Trade {
        fn field_names() -> Vec<&'static str> {
            vec!["symbol", "qty", "price"]
        }

        fn values(&self) -> Vec<Scalar> {
            vec![
                Scalar::from(self.symbol),
                Scalar::from(self.qty),
                Scalar::from(self.price),
            ]
        }
    }

    let rows = [
        Trade {
            symbol: "AAA",
            qty: 10,
            price: Some(1.25),
        },
        Trade {
            symbol: "BBB",
            qty: -3,
            price: None,
        },
    ];
    let f = hekla::Frame::from_structs(&rows).unwrap();
    assert_eq!(f.nrows(), 2);
    assert_eq!(f.names(), vec!["symbol", "qty", "price"]);
    assert_eq!(f.column("qty").unwrap().get(1), Scalar::I64(-3));
    assert!(f.column("price").unwrap().get(1).is_null());
}

#[test]
fn gather_opt_null_sentinel() {
    let c = Column::from_strs(&["a", "b", "c"]).unwrap();
    let out = c.gather_opt(&[2, -1, 0]).unwrap();
    assert_eq!(out.get(0), Scalar::from("c"));
    assert!(out.get(1).is_null());
    assert_eq!(out.get(2), Scalar::from("a"));
}
