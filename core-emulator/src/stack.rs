//! Bounded stack implementation, with a builder-style API for taking several operands at once
//! and supporting a "keep" mode which reads operands without popping them.

use crate::{common::{Cell, StackMode}, error::Fault};

/// Models one of PMX's two bounded stacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stack {
    mode: StackMode,
    pointer: usize, // Number of items; the top is at `pointer - 1`
    data: Box<[Cell]>,
}

impl Stack {
    pub fn new(mode: StackMode, capacity: usize) -> Self {
        Self {
            mode,
            pointer: 0,
            data: vec![0; capacity].into_boxed_slice(),
        }
    }

    pub fn new_with_data(mode: StackMode, capacity: usize, data: &[Cell]) -> Result<Self, Fault> {
        let mut stack = Self::new(mode, capacity);

        for datum in data {
            stack.push(*datum)?;
        }

        Ok(stack)
    }

    /// Index of the top item, or -1 if the stack is empty.
    pub fn top_index(&self) -> isize {
        self.pointer as isize - 1
    }

    pub fn len(&self) -> usize {
        self.pointer
    }

    pub fn is_empty(&self) -> bool {
        self.pointer == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The stack's contents, from bottom to top.
    pub fn cells(&self) -> &[Cell] {
        &self.data[..self.pointer]
    }

    pub fn clear(&mut self) {
        self.pointer = 0;
    }

    pub fn push(&mut self, cell: Cell) -> Result<(), Fault> {
        let slot = self.data.get_mut(self.pointer)
            .ok_or(Fault::StackOverflow { stack: self.mode })?;
        *slot = cell;
        self.pointer += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Cell, Fault> {
        let (cell,) = self.take_operands(AccessMode::Pop).cell().done()?;
        Ok(cell)
    }

    /// Replaces the top item with the result of `f`.
    pub fn modify_top(&mut self, f: impl FnOnce(Cell) -> Cell) -> Result<(), Fault> {
        let top = self.pointer.checked_sub(1)
            .ok_or(Fault::StackUnderflow { stack: self.mode })?;
        self.data[top] = f(self.data[top]);
        Ok(())
    }

    /// Removes the top `count` items, typically after reading them with [`AccessMode::Keep`].
    pub fn discard(&mut self, count: usize) -> Result<(), Fault> {
        self.pointer = self.pointer.checked_sub(count)
            .ok_or(Fault::StackUnderflow { stack: self.mode })?;
        Ok(())
    }

    /// Fails with an overflow unless `count` more items would fit.
    pub fn reserve(&self, count: usize) -> Result<(), Fault> {
        if self.pointer + count > self.data.len() {
            return Err(Fault::StackOverflow { stack: self.mode });
        }
        Ok(())
    }

    pub fn take_operands(&mut self, mode: AccessMode) -> StackOperandAccessor<'_, ()> {
        StackOperandAccessor::new(self, mode)
    }
}

/// Reads successive operands downwards from the top of a stack.
///
/// Nothing is removed until [`StackOperandAccessor::done`] is called, and then only in
/// [`AccessMode::Pop`], so a failed access leaves the stack as it was.
pub struct StackOperandAccessor<'s, T> {
    stack: &'s mut Stack,
    pointer: usize,
    mode: AccessMode,
    data: Result<T, Fault>,
}

impl<'s> StackOperandAccessor<'s, ()> {
    fn new(stack: &'s mut Stack, mode: AccessMode) -> Self {
        StackOperandAccessor {
            pointer: stack.pointer,
            stack,
            mode,
            data: Ok(()),
        }
    }
}

impl<'s, T> StackOperandAccessor<'s, T> {
    fn extend<U>(self, f: impl FnOnce(T, Cell) -> U) -> StackOperandAccessor<'s, U> {
        let StackOperandAccessor { stack, pointer, mode, data } = self;

        let next = data.and_then(|data| {
            let (cell, pointer) = cell_below(stack, pointer)?;
            Ok((f(data, cell), pointer))
        });

        match next {
            Ok((data, pointer)) => StackOperandAccessor { stack, pointer, mode, data: Ok(data) },
            Err(fault) => StackOperandAccessor { stack, pointer, mode, data: Err(fault) },
        }
    }

    pub fn done(self) -> Result<T, Fault> {
        let data = self.data?;

        if self.mode == AccessMode::Pop {
            self.stack.pointer = self.pointer;
        }

        Ok(data)
    }
}

impl<'s> StackOperandAccessor<'s, ()> {
    pub fn cell(self) -> StackOperandAccessor<'s, (Cell,)> {
        self.extend(|(), cell| (cell,))
    }
}

impl<'s> StackOperandAccessor<'s, (Cell,)> {
    pub fn then_cell(self) -> StackOperandAccessor<'s, (Cell, Cell)> {
        self.extend(|(a,), cell| (a, cell))
    }
}

impl<'s> StackOperandAccessor<'s, (Cell, Cell)> {
    pub fn then_cell(self) -> StackOperandAccessor<'s, (Cell, Cell, Cell)> {
        self.extend(|(a, b), cell| (a, b, cell))
    }
}

fn cell_below(stack: &Stack, pointer: usize) -> Result<(Cell, usize), Fault> {
    let pointer = pointer.checked_sub(1)
        .ok_or(Fault::StackUnderflow { stack: stack.mode })?;
    Ok((stack.data[pointer], pointer))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    /// Remove accessed items from the stack.
    Pop,

    /// Keep accessed items on the stack.
    Keep,
}

#[cfg(test)]
mod test {
    use crate::{common::StackMode, error::Fault};
    use super::{AccessMode, Stack};

    #[test]
    fn test_stack_pop() {
        let mut stack = Stack::new_with_data(StackMode::Working, 8, &[1, 2, 3, 4]).unwrap();

        let (a, b, c) = stack
            .take_operands(AccessMode::Pop)
            .cell().then_cell().then_cell()
            .done()
            .unwrap();

        assert_eq!((a, b, c), (4, 3, 2));
        assert_eq!(stack.cells(), [1]);
        assert_eq!(stack.top_index(), 0);
    }

    #[test]
    fn test_stack_keep() {
        let mut stack = Stack::new_with_data(StackMode::Working, 8, &[1, 2]).unwrap();

        let (a, b) = stack
            .take_operands(AccessMode::Keep)
            .cell().then_cell()
            .done()
            .unwrap();

        assert_eq!((a, b), (2, 1));
        assert_eq!(stack.cells(), [1, 2]);
    }

    #[test]
    fn test_stack_underflow_leaves_stack_intact() {
        let mut stack = Stack::new_with_data(StackMode::Return, 8, &[9]).unwrap();

        let result = stack
            .take_operands(AccessMode::Pop)
            .cell().then_cell()
            .done();

        assert_eq!(result, Err(Fault::StackUnderflow { stack: StackMode::Return }));
        assert_eq!(stack.cells(), [9]);

        let mut empty = Stack::new(StackMode::Working, 8);
        assert_eq!(empty.pop(), Err(Fault::StackUnderflow { stack: StackMode::Working }));
        assert_eq!(empty.modify_top(|n| n + 1), Err(Fault::StackUnderflow { stack: StackMode::Working }));
        assert_eq!(empty.top_index(), -1);
    }

    #[test]
    fn test_stack_overflow() {
        let mut stack = Stack::new_with_data(StackMode::Working, 2, &[1, 2]).unwrap();

        assert_eq!(stack.push(3), Err(Fault::StackOverflow { stack: StackMode::Working }));
        assert_eq!(stack.cells(), [1, 2]);
        assert_eq!(stack.reserve(1), Err(Fault::StackOverflow { stack: StackMode::Working }));
    }

    #[test]
    fn test_stack_discard() {
        let mut stack = Stack::new_with_data(StackMode::Working, 4, &[1, 2, 3]).unwrap();

        assert_eq!(stack.reserve(1), Ok(()));
        assert_eq!(stack.discard(4), Err(Fault::StackUnderflow { stack: StackMode::Working }));
        assert_eq!(stack.cells(), [1, 2, 3]);

        stack.discard(2).unwrap();
        assert_eq!(stack.cells(), [1]);
    }
}
