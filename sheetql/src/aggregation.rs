//! A map-expression/reduce-function pair: `map` runs per input row to build
//! a bag of values, `reduce` collapses the bag to one output value.

use sheetql_parser::{Column, Expression, Function, Value};

#[derive(Debug, Clone)]
pub struct Aggregation {
    pub map: Expression,
    pub reduce: Function,
    pub target: Column,
}

impl Aggregation {
    pub fn new(target: Column, map: Expression, reduce: Function) -> Self {
        Aggregation { map, reduce, target }
    }

    pub fn reduce_bag(&self, bag: &[Value]) -> Value {
        self.reduce.apply(bag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduces_a_bag_with_its_function() {
        let agg = Aggregation::new(
            Column::new("Total"),
            Expression::sibling("Amount"),
            Function::Sum,
        );
        let bag = vec![Value::Int(1), Value::Int(2), Value::Int(3)];
        assert_eq!(agg.reduce_bag(&bag), Value::Double(6.0));
    }
}
