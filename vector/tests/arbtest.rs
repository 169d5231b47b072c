use arbitrary::Unstructured;
use arbtest::{arbitrary, arbtest};
use rrb_vector::{Const, Error, ValidBranchingConstant, Vector};

#[derive(arbitrary::Arbitrary, Debug)]
enum Op {
    Push(u32),
    Pop,
    Extend(Vec<u32>),
    Update(usize, u32),
    // Concatenates a vector of the given contents, on the given side.
    Concat(Vec<u32>, bool),
    // Slice(start, len), both taken modulo the current length.
    Slice(usize, usize),
    // Concatenates the vector with itself, to grow tall trees quickly.
    Double,
    Clone,
}

impl Op {
    fn apply_to_vec(&self, vec: &mut Vec<u32>) {
        match self {
            Op::Push(x) => vec.push(*x),
            Op::Pop => {
                vec.pop();
            }
            Op::Extend(xs) => vec.extend_from_slice(xs),
            Op::Update(idx, x) => {
                if !vec.is_empty() {
                    let len = vec.len();
                    vec[idx % len] = *x;
                }
            }
            Op::Concat(xs, on_the_left) => {
                if *on_the_left {
                    vec.splice(0..0, xs.iter().copied());
                } else {
                    vec.extend_from_slice(xs);
                }
            }
            Op::Slice(start, len) => {
                let (start, end) = slice_bounds(vec.len(), *start, *len);
                vec.truncate(end);
                vec.drain(..start);
            }
            Op::Double => vec.extend_from_within(..),
            Op::Clone => {}
        }
    }

    fn apply_to_vector<const N: usize>(
        &self,
        vec: &mut Vector<u32, N>,
        arena: &mut Vec<Vector<u32, N>>,
    ) where
        Const<N>: ValidBranchingConstant,
    {
        match self {
            Op::Push(x) => *vec = vec.push(*x),
            Op::Pop => {
                if let Ok(popped) = vec.pop() {
                    *vec = popped;
                }
            }
            Op::Extend(xs) => vec.extend(xs.iter().copied()),
            Op::Update(idx, x) => {
                if !vec.is_empty() {
                    *vec = vec.update(idx % vec.len(), *x).unwrap();
                }
            }
            Op::Concat(xs, on_the_left) => {
                let other: Vector<u32, N> = xs.iter().copied().collect();
                *vec = if *on_the_left {
                    other.concat(vec)
                } else {
                    vec.concat(&other)
                };
            }
            Op::Slice(start, len) => {
                let (start, end) = slice_bounds(vec.len(), *start, *len);
                *vec = vec.slice(start, end).unwrap();
            }
            Op::Double => {
                let other = vec.clone();
                *vec = vec.concat(&other);
            }
            Op::Clone => {
                arena.push(vec.clone());
            }
        }
    }
}

fn slice_bounds(len: usize, start: usize, slice_len: usize) -> (usize, usize) {
    let start = start % (len + 1);
    let end = start + slice_len % (len - start + 1);
    (start, end)
}

#[derive(arbitrary::Arbitrary, Debug)]
enum TransientOp {
    Push(u32),
    Pop,
    Update(usize, u32),
    Slice(usize, usize),
}

impl TransientOp {
    fn apply_to_vec(&self, vec: &mut Vec<u32>) -> Option<u32> {
        match self {
            TransientOp::Push(x) => vec.push(*x),
            TransientOp::Pop => return vec.pop(),
            TransientOp::Update(idx, x) => {
                if !vec.is_empty() {
                    let len = vec.len();
                    vec[idx % len] = *x;
                }
            }
            TransientOp::Slice(start, len) => {
                let (start, end) = slice_bounds(vec.len(), *start, *len);
                vec.truncate(end);
                vec.drain(..start);
            }
        }
        None
    }

    fn apply_to_transient<const N: usize>(
        &self,
        transient: &mut rrb_vector::Transient<u32, N>,
    ) -> Option<u32>
    where
        Const<N>: ValidBranchingConstant,
    {
        match self {
            TransientOp::Push(x) => transient.push(*x),
            TransientOp::Pop => return transient.pop().ok(),
            TransientOp::Update(idx, x) => {
                if !transient.is_empty() {
                    let len = transient.len();
                    transient.update(idx % len, *x).unwrap();
                }
            }
            TransientOp::Slice(start, len) => {
                let (start, end) = slice_bounds(transient.len(), *start, *len);
                transient.slice(start, end).unwrap();
            }
        }
        None
    }
}

// u.arbitrary() generates very short vecs by default:
// https://github.com/matklad/arbtest/issues/8
fn arb_vec(u: &mut Unstructured<'_>) -> arbitrary::Result<Vec<u32>> {
    let len = u.arbitrary_len::<u32>()?;
    std::iter::from_fn(|| Some(u.arbitrary::<u32>()))
        .take(len)
        .collect()
}

fn check_equal<const N: usize>(vec: &[u32], vector: &Vector<u32, N>)
where
    Const<N>: ValidBranchingConstant,
{
    vector.check_invariants();
    assert_eq!(vec.len(), vector.len());
    assert_eq!(vec, vector.iter().copied().collect::<Vec<_>>());
    assert_eq!(vec.last(), vector.peek());
    for (i, elt) in vec.iter().enumerate() {
        assert_eq!(Some(elt), vector.get(i));
    }
    assert_eq!(None, vector.get(vec.len()));
}

#[test]
fn mutations() {
    arbtest(|u| {
        let mut vec: Vec<u32> = arb_vec(u)?;
        let mut vector: Vector<u32, 4> = vec.iter().copied().collect();
        let mut arena = Vec::new();
        let mut snapshots = Vec::new();
        let ops: Vec<Op> = u.arbitrary()?;

        for op in ops {
            // Keep the trees from growing without bound.
            if vec.len() > 5000 {
                continue;
            }
            op.apply_to_vec(&mut vec);
            op.apply_to_vector(&mut vector, &mut arena);

            check_equal(&vec, &vector);
            if matches!(op, Op::Clone) {
                snapshots.push(vec.clone());
            }
        }

        // Older versions are unaffected by later operations.
        for (snapshot, vector) in snapshots.iter().zip(&arena) {
            check_equal(snapshot, vector);
        }

        Ok(())
    });
}

#[test]
fn transient_mutations() {
    arbtest(|u| {
        let mut vec: Vec<u32> = arb_vec(u)?;
        let source: Vector<u32, 4> = vec.iter().copied().collect();
        let mut transient = source.transient();
        let ops: Vec<TransientOp> = u.arbitrary()?;

        for op in ops {
            let expected = op.apply_to_vec(&mut vec);
            let actual = op.apply_to_transient(&mut transient);
            assert_eq!(expected, actual);
            assert_eq!(vec.len(), transient.len());
            assert_eq!(vec.last(), transient.peek());
        }

        let vector = transient.persistent();
        check_equal(&vec, &vector);
        source.check_invariants();

        Ok(())
    });
}

#[test]
fn concat_and_slice() {
    arbtest(|u| {
        let left: Vec<u32> = arb_vec(u)?;
        let right: Vec<u32> = arb_vec(u)?;
        let left_vector: Vector<u32, 4> = left.iter().copied().collect();
        let right_vector: Vector<u32, 4> = right.iter().copied().collect();

        let both = left_vector.concat(&right_vector);
        let expected: Vec<u32> = left.iter().chain(&right).copied().collect();
        check_equal(&expected, &both);

        let from = u.arbitrary::<usize>()? % (expected.len() + 1);
        let to = from + u.arbitrary::<usize>()? % (expected.len() - from + 1);
        let sliced = both.slice(from, to).unwrap();
        check_equal(&expected[from..to], &sliced);

        assert_eq!(
            both.slice(to, to + expected.len() + 1),
            Err(Error::InvalidRange {
                from: to,
                to: to + expected.len() + 1,
                len: expected.len()
            })
        );

        Ok(())
    });
}

#[test]
fn into_iter() {
    arbtest(|u| {
        let vec: Vec<u32> = arb_vec(u)?;
        let vector: Vector<u32, 4> = vec.iter().copied().collect();

        let iter = vector.clone().into_iter();
        assert_eq!(iter.len(), vec.len());
        let result: Vec<u32> = iter.collect();
        assert_eq!(result, vec);
        // Consuming a clone leaves the original alone.
        check_equal(&vec, &vector);

        Ok(())
    });
}
